//! CLI command handlers
//!
//! Each handler prints its result to stdout and returns any error to `main`.

use crate::config::NodeConfig;
use crate::core::BloomFilter;
use crate::network::payloads::{FilterLoadPayload, PingPayload};
use crate::network::{Message, MessageType, Payload};
use std::path::Path;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Write a default config file
pub fn cmd_init(path: &Path, force: bool) -> CliResult<()> {
    if path.exists() && !force {
        println!("⚠️  Config already exists at {:?}", path);
        println!("   Use --force to overwrite");
        return Ok(());
    }

    let config = NodeConfig::default();
    config.save(path)?;
    println!("✅ Config written to {:?}", path);
    println!("   🌐 Network: {}", config.network);
    println!("   🔌 Port: {}", config.port);
    Ok(())
}

/// Decode a hex encoded envelope
pub fn cmd_decode(hex_data: &str) -> CliResult<()> {
    let hex_data = hex_data.trim().trim_start_matches("0x");
    let bytes = hex::decode(hex_data)?;
    let msg = Message::from_bytes(&bytes)?;

    println!("📦 Message: {}", msg.msg_type);
    println!("   ├─ Type code: {:#04x}", msg.msg_type.as_u8());
    println!("   ├─ Compressed: {}", msg.is_compressed());
    println!("   ├─ Envelope size: {} bytes", bytes.len());
    println!("   └─ Payload: {} ({} bytes)", msg.payload.type_name(), msg.payload.size());
    println!("{}", serde_json::to_string_pretty(&msg.payload)?);
    Ok(())
}

/// Build a PING envelope
pub fn cmd_ping(height: u32, compress: bool) -> CliResult<()> {
    let msg = Message::new(MessageType::Ping, Payload::Ping(PingPayload::new(height)));
    let bytes = msg.to_bytes_with(compress)?;
    println!("{}", hex::encode(bytes));
    Ok(())
}

/// Evaluate addresses against the configured IP filter
pub fn cmd_filter(config_path: Option<&Path>, addresses: &[String]) -> CliResult<()> {
    let config = match config_path {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    let filter = config.build_ip_filter()?;

    println!(
        "🛡️  IP filter: {} blacklist, {} whitelist entries",
        config.ip_filter.blacklist.len(),
        config.ip_filter.whitelist.len()
    );
    for address in addresses {
        match filter.is_allowed(address) {
            Ok(true) => println!("   ✅ {} allowed", address),
            Ok(false) => println!("   ❌ {} denied", address),
            Err(e) => println!("   ⚠️  {}: {}", address, e),
        }
    }
    Ok(())
}

/// Build a bloom filter and its FILTERLOAD envelope
pub fn cmd_bloom(bits: usize, hashes: u8, tweak: u32, elements: &[String]) -> CliResult<()> {
    let mut bloom = BloomFilter::new(bits, hashes, tweak, None)?;
    for element in elements {
        bloom.add(element.as_bytes());
    }

    let payload = FilterLoadPayload::from_bloom(&bloom)?;
    let msg = Message::new(MessageType::FilterLoad, Payload::FilterLoad(payload));

    println!("🌸 Bloom filter: {} bits, {} hash functions", bloom.bit_len(), bloom.hash_funcs());
    println!("   ├─ Seeds: {:?}", bloom.seeds());
    println!("   ├─ Bits: {}", hex::encode(bloom.get_bits()));
    println!("   └─ FILTERLOAD: {}", hex::encode(msg.to_bytes()?));
    Ok(())
}
