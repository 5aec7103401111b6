use console::Style;

const BANNER: &str = r#"
     _                              _
  __| |_ __   _____      ____   ___| |
 / _` | '_ \ / _ \ \ /\ / / _` |/ _` |
| (_| | |_) | (_) \ V  V / (_| | (_| |
 \__,_| .__/ \___/ \_/\_/ \__,_|\__,_|
      |_|"#;

/// Print the dpowd startup banner with version info.
pub fn print_banner() {
    let green = Style::new().green().bold();
    let dim = Style::new().dim();

    println!("{}", green.apply_to(BANNER));
    println!(
        "  {}",
        dim.apply_to(format!(
            "v{} · notary-governed deposit gateway",
            env!("CARGO_PKG_VERSION")
        ))
    );
    println!();
}
