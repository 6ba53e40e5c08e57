use clap::{Parser, Subcommand};
use num_bigint::BigUint;
use num_traits::Num;
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use evm_codec::allocate::{Allocations, selector_of};
use evm_codec::config::{Config, ConfigError};
use evm_codec::conversion::{from_hex, keccak256, to_hex_string};
use evm_codec::format::{ParseTypeError, parse_signature};
use evm_codec::json::{JsonValueError, value_from_json};
use evm_codec::{
    DecoderOptions, EncodeError, Type, UserDefinedTypes, Value, encode_mapping_key, key_info_for_printing,
    parse_type,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Type error: {0}")]
    ParseType(#[from] ParseTypeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Value error: {0}")]
    Value(#[from] JsonValueError),

    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Invalid hex: {0}")]
    Hex(String),

    #[error("Invalid slot: {0}")]
    Slot(String),

    #[error(transparent)]
    Codec(#[from] evm_codec::Error),

    #[error("{0} has no mapping-key encoding")]
    NotAKey(String),
}

#[derive(Parser)]
#[command(name = "evm-codec")]
#[command(about = "Encode and decode EVM values by type")]
struct Cli {
    /// TOML project file with struct and enum definitions
    #[arg(long, global = true, env = "EVM_CODEC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// ABI-encode a JSON value
    Encode {
        /// Type description, e.g. "uint256" or "(uint8,string)"
        #[arg(short = 't', long = "type")]
        ty: String,

        /// JSON literal for the value
        #[arg(short, long)]
        value: String,
    },

    /// Decode ABI-encoded bytes
    Decode {
        /// Type description
        #[arg(short = 't', long = "type")]
        ty: String,

        /// Hex-encoded data
        #[arg(short, long)]
        data: String,

        /// Fail on anything that would not re-encode to the same bytes
        #[arg(long)]
        strict: bool,
    },

    /// Show the mapping-key encoding of a value
    MappingKey {
        /// Key type description
        #[arg(short = 't', long = "type")]
        ty: String,

        /// JSON literal for the key
        #[arg(short, long)]
        value: String,
    },

    /// Compute the storage slot of a mapping entry
    Slot {
        /// Key type description
        #[arg(short = 't', long = "type")]
        ty: String,

        /// JSON literal for the key
        #[arg(short, long)]
        key: String,

        /// Slot of the mapping itself (decimal or 0x hex)
        #[arg(short, long, default_value = "0")]
        slot: String,
    },

    /// Compute the selector and event topic of a signature
    Selector {
        /// Signature such as "transfer(address,uint256)"
        signature: String,
    },
}

fn load_types(config: Option<&PathBuf>) -> Result<(UserDefinedTypes, Allocations, DecoderOptions), AppError> {
    match config {
        Some(path) => {
            let config = Config::from_file(path)?;
            let (types, allocations) = config.allocations()?;
            Ok((types, allocations, config.decoder_options()))
        }
        None => {
            let types = UserDefinedTypes::new();
            let allocations = Allocations::new(&types);
            Ok((types, allocations, DecoderOptions::default()))
        }
    }
}

fn parse_value(ty: &Type, json: &str, types: &UserDefinedTypes) -> Result<Value, AppError> {
    let json: serde_json::Value = serde_json::from_str(json)?;
    Ok(value_from_json(ty, &json, types)?)
}

fn parse_slot(text: &str) -> Result<BigUint, AppError> {
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => BigUint::from_str_radix(hex, 16),
        None => BigUint::from_str_radix(text, 10),
    };
    parsed.map_err(|_| AppError::Slot(text.to_string()))
}

fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (types, allocations, options) = load_types(cli.config.as_ref())?;

    match cli.command {
        Commands::Encode { ty, value } => {
            let ty = parse_type(&ty, &types)?;
            let value = parse_value(&ty, &value, &types)?;
            // a one-element argument list, so dynamic values carry their offset word
            let encoded = evm_codec::encode::try_encode_abi(&Value::tuple(vec![value]), &allocations.abi)?;
            println!("{}", to_hex_string(&encoded));
            Ok(())
        }
        Commands::Decode { ty, data, strict } => {
            let ty = parse_type(&ty, &types)?;
            let bytes = from_hex(&data).map_err(|e| AppError::Hex(e.to_string()))?;
            let options = DecoderOptions {
                strict_abi_mode: strict || options.strict_abi_mode,
                ..options
            };
            let value = evm_codec::decode_abi_bytes_with(&ty, &bytes, &types, &allocations, options)?;
            println!("{value}");
            Ok(())
        }
        Commands::MappingKey { ty, value } => {
            let ty = parse_type(&ty, &types)?;
            let key = parse_value(&ty, &value, &types)?;
            let encoded = encode_mapping_key(&key).ok_or_else(|| AppError::NotAKey(ty.type_string()))?;
            println!("{}", to_hex_string(&encoded));
            if let Some(info) = key_info_for_printing(&key) {
                println!("{}: {}", info.ty, info.value);
            }
            Ok(())
        }
        Commands::Slot { ty, key, slot } => {
            let ty = parse_type(&ty, &types)?;
            let key = parse_value(&ty, &key, &types)?;
            let base = parse_slot(&slot)?;
            let address = evm_codec::encode::mapping_slot(&key, &base)
                .ok_or_else(|| AppError::NotAKey(ty.type_string()))?;
            println!("{}", to_hex_string(&address));
            Ok(())
        }
        Commands::Selector { signature } => {
            let (name, parameters) = parse_signature(&signature, &types)?;
            let canonical = parameters
                .iter()
                .map(|ty| ty.abi_type_string(&types))
                .collect::<Option<Vec<_>>>()
                .map(|list| format!("{name}({})", list.join(",")))
                .unwrap_or(signature);
            println!("{canonical}");
            println!("selector: {}", to_hex_string(&selector_of(&canonical)));
            println!("topic:    {}", to_hex_string(&keccak256(canonical.as_bytes())));
            Ok(())
        }
    }
}
