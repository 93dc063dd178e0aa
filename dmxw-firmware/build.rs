// Build-Script: Wird vor dem Kompilieren ausgeführt
// Konfiguriert den Linker für ESP32-C6 Embedded Rust

fn main() {
    // Lade .env file für Rolle und Node-ID
    // Fehler ignorieren wenn .env nicht existiert (dann müssen ENV vars gesetzt sein)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("⚠️  .env file nicht gefunden: {}", e);
        eprintln!("   Setze DMXW_ROLE und DMXW_NODE_ID als Environment-Variablen");
    }

    // Rolle: "node" oder "tester"
    let role = std::env::var("DMXW_ROLE").unwrap_or_else(|_| "node".into());
    if role != "node" && role != "tester" {
        panic!("DMXW_ROLE muss \"node\" oder \"tester\" sein, ist \"{}\"", role);
    }
    println!("cargo:rustc-env=DMXW_ROLE={}", role);

    // Node-ID 2..=49 (1 ist das Gateway, der Tester sendet als Gateway)
    let node_id = std::env::var("DMXW_NODE_ID").unwrap_or_else(|_| "2".into());
    match node_id.parse::<u8>() {
        Ok(id) if (2..=49).contains(&id) => {}
        _ => panic!("DMXW_NODE_ID muss zwischen 2 und 49 liegen, ist \"{}\"", node_id),
    }
    println!("cargo:rustc-env=DMXW_NODE_ID={}", node_id);

    // WiFi-Kanal für ESP-NOW, muss auf allen Teilnehmern gleich sein
    let channel = std::env::var("DMXW_RADIO_CHANNEL").unwrap_or_else(|_| "1".into());
    match channel.parse::<u8>() {
        Ok(ch) if (1..=13).contains(&ch) => {}
        _ => panic!("DMXW_RADIO_CHANNEL muss zwischen 1 und 13 liegen, ist \"{}\"", channel),
    }
    println!("cargo:rustc-env=DMXW_RADIO_CHANNEL={}", channel);

    println!("cargo:rerun-if-env-changed=DMXW_ROLE");
    println!("cargo:rerun-if-env-changed=DMXW_NODE_ID");
    println!("cargo:rerun-if-env-changed=DMXW_RADIO_CHANNEL");

    // Registriere hilfsbereiten Error-Handler für Linker-Fehler
    linker_be_nice();

    // Füge Linker-Skripte hinzu:

    // 1. defmt.x - defmt Logging-Support
    //    Definiert Symbole für defmt's binäres Log-Format
    println!("cargo:rustc-link-arg=-Tdefmt.x");

    // 2. linkall.x - ESP32 Memory-Layout
    //    WICHTIG: Muss als LETZTES kommen (sonst Probleme mit flip-link)
    //    Definiert Flash/RAM-Layout und Startup-Code
    println!("cargo:rustc-link-arg=-Tlinkall.x");
}

// Error-Handler: Zeigt hilfreiche Tipps bei Linker-Fehlern
// Wird vom Linker als "--error-handling-script" aufgerufen
fn linker_be_nice() {
    let args: Vec<String> = std::env::args().collect();

    // Wenn vom Linker aufgerufen (mit Error-Typ und Symbol-Name)
    if args.len() > 1 {
        let kind = &args[1]; // Fehler-Typ (z.B. "undefined-symbol")
        let what = &args[2]; // Symbol-Name (z.B. "_defmt_...")

        match kind.as_str() {
            // Undefiniertes Symbol gefunden
            "undefined-symbol" => match what.as_str() {
                what if what.starts_with("_defmt_") => {
                    eprintln!();
                    eprintln!(
                        "💡 `defmt` not found - make sure `defmt.x` is added as a linker script and you have included `use defmt_rtt as _;`"
                    );
                    eprintln!();
                }
                "_stack_start" => {
                    eprintln!();
                    eprintln!("💡 Is the linker script `linkall.x` missing?");
                    eprintln!();
                }
                what if what.starts_with("esp_rtos_") => {
                    eprintln!();
                    eprintln!(
                        "💡 `esp-radio` has no scheduler enabled. Make sure you have initialized `esp-rtos` or provided an external scheduler."
                    );
                    eprintln!();
                }
                "free"
                | "malloc"
                | "calloc"
                | "get_free_internal_heap_size"
                | "malloc_internal"
                | "realloc_internal"
                | "calloc_internal"
                | "free_internal" => {
                    eprintln!();
                    eprintln!(
                        "💡 Did you forget the `esp-alloc` dependency or didn't enable the `compat` feature on it?"
                    );
                    eprintln!();
                }
                _ => (),
            },
            // we don't have anything helpful for "missing-lib" yet
            _ => {
                std::process::exit(1);
            }
        }

        std::process::exit(0);
    }

    println!(
        "cargo:rustc-link-arg=--error-handling-script={}",
        std::env::current_exe().unwrap().display()
    );
}
