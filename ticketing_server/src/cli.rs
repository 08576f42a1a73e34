use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "TKT_HOST",
        "TKT_PORT",
        "TKT_DATABASE_URL",
        "TKT_PUBLIC_BASE_URL",
        "TKT_USE_X_FORWARDED_FOR",
        "TKT_USE_FORWARDED",
        "TKT_CASHFREE_ENVIRONMENT",
        "TKT_CASHFREE_CLIENT_ID",
        "TKT_CASHFREE_API_VERSION",
        "TKT_GATEWAY_TIMEOUT_SECS",
        "TKT_WEBHOOK_SIGNATURE_CHECKS",
        "TKT_PENDING_ALERT_MINUTES",
        "TKT_PENDING_SWEEP_INTERVAL_SECS",
        "TKT_PROMO_RESYNC_INTERVAL_MINS",
    ];


    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
