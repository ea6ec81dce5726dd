//! Fake toolchain used by unit tests.
//!
//! The script understands `lib install <name>` and
//! `compile --fqbn <board> <sketch> --output-dir <out>`. Special board names
//! select failure modes or leave helper processes behind; any other board
//! produces `<out>/nested/<sketch>.ino.hex` containing the board and the
//! source text.

use std::path::Path;

use crate::toolchain::ToolchainConfig;

const SCRIPT: &str = r#"
case "$1" in
  lib)
    case "$3" in
      Broken*) echo "Error installing $3: library not found" >&2; exit 1 ;;
    esac
    echo "$3" >> "$INSTALL_LOG"
    echo "Installed $3"
    ;;
  compile)
    board="$3"; sketch="$4"; out="$6"
    case "$board" in
      test:fail) echo "sketch.ino:1:1: error: 'foo' was not declared in this scope" >&2; exit 1 ;;
      test:stdout-fail) echo "Error during build: stdout only"; exit 1 ;;
      test:quiet-fail) exit 3 ;;
      test:empty) echo "Sketch uses 0 bytes"; touch "$out/sketch.elf"; exit 0 ;;
      test:slow) exec sleep 5 ;;
      test:background-writer)
        ( sleep 1; mkdir -p "$out/obj"; echo x > "$out/obj/a.o" ) &
        wait
        ;;
      test:straggler)
        ( sleep 1; mkdir -p "$out/late" ) > /dev/null 2>&1 &
        ;;
      test:noisy) yes "noise" | head -n 4096 >&2 ;;
    esac
    name=$(basename "$sketch")
    mkdir -p "$out/nested"
    { printf '%s\n' "$board"; cat "$sketch/$name.ino"; } > "$out/nested/$name.ino.hex"
    echo "Sketch uses 924 bytes"
    ;;
  *)
    echo "unknown command: $1" >&2
    exit 2
    ;;
esac
"#;

/// Write the fake toolchain into `dir` and return a config that runs it.
///
/// The script is run through `sh` rather than executed directly, so tests
/// that write scripts concurrently never hit `ETXTBSY`.
pub(crate) fn fake_toolchain(dir: &Path) -> ToolchainConfig {
    let script = dir.join("fake-arduino-cli.sh");
    let log = dir.join("installs.log");
    let body = format!("INSTALL_LOG='{}'\n{}", log.display(), SCRIPT);
    std::fs::write(&script, body).expect("Failed to write fake toolchain");

    ToolchainConfig {
        program: "sh".into(),
        global_args: vec![script.display().to_string()],
        ..ToolchainConfig::default()
    }
}

/// Libraries the fake toolchain has installed, in order.
pub(crate) fn installed_libraries(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("installs.log"))
        .map(|log| log.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
