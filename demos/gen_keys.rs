use std::env;
use std::process;

use wxopen_rs::keygen::{generate_encoding_aes_key, generate_token, verify_encoding_aes_key};

/// Generate a callback Token and EncodingAESKey, printed as .env lines.
///
/// Usage:
///   cargo run --example gen_keys
///   cargo run --example gen_keys -- --len 16
///
/// Output (stdout):
///   WXOPEN_TOKEN=<alphanumeric, up to 32 chars>
///   WXOPEN_AES_KEY=<43-char alphanumeric>
fn main() {
    let mut len = env::var("WXOPEN_TOKEN_LEN")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(32);

    let args: Vec<String> = env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                eprintln!("Usage: gen_keys [--len N]  (1..=32, default 32)");
                return;
            }
            "--len" | "-l" => match args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) {
                Some(n) => {
                    len = n;
                    i += 1;
                }
                None => {
                    eprintln!("--len needs a number");
                    process::exit(1);
                }
            },
            _ => {}
        }
        i += 1;
    }

    let token = generate_token(len);
    let aes_key = generate_encoding_aes_key();
    if !verify_encoding_aes_key(&aes_key) {
        eprintln!("generated EncodingAESKey failed verification, run again");
        process::exit(2);
    }

    println!("WXOPEN_TOKEN={}", token);
    println!("WXOPEN_AES_KEY={}", aes_key);
}
