use anyhow::Result;
use clap::Parser;

use xui_client::utils::crypto::{generate_x25519_keypair, random_short_id};

#[derive(Parser, Debug)]
#[command(author, version, about = "REALITY 密钥对与 shortId 生成工具", long_about = None)]
struct Args {
    /// 生成的 shortId 个数
    #[arg(short = 'n', long, default_value_t = 1)]
    short_ids: usize,

    /// 每个 shortId 的字节数 (1-8)
    #[arg(short, long, default_value_t = 8)]
    bytes: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.bytes == 0 || args.bytes > 8 {
        anyhow::bail!("shortId 字节数必须在 1 到 8 之间");
    }

    let keys = generate_x25519_keypair();
    let short_ids: Vec<String> = (0..args.short_ids)
        .map(|_| random_short_id(args.bytes))
        .collect();

    println!("========================================");
    println!("Xray Reality Key Generation Tool");
    println!("========================================");
    println!();
    println!("Private key: {}", keys.private_key);
    println!("Public key:  {}", keys.public_key);
    for short_id in &short_ids {
        println!("Short id:    {}", short_id);
    }
    println!();
    println!("1. Inbound (panel streamSettings):");
    println!("   \"realitySettings\": {{");
    println!("     \"privateKey\": \"{}\",", keys.private_key);
    println!("     \"shortIds\": {:?}", short_ids);
    println!("   }}");
    println!();
    println!("2. Outbound / client:");
    println!("   \"realitySettings\": {{");
    println!("     \"publicKey\": \"{}\",", keys.public_key);
    println!(
        "     \"shortId\": \"{}\"",
        short_ids.first().map(String::as_str).unwrap_or_default()
    );
    println!("   }}");
    println!();
    println!("Note: Keep the private key secure and do not share it!");

    Ok(())
}
