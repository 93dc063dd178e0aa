// Task-Modul: Enthält alle Embassy Tasks
//
// Jeder Task läuft asynchron und unabhängig.
// Node und Tester reden mit dem LED-Task nur über den LED-Channel.

pub mod led;
pub mod node;
pub mod tester;

// Re-export Tasks für einfachen Import
pub use led::led_task;
pub use node::node_task;
pub use tester::tester_task;
