//! Globally available variables: `this`, `msg`, `tx` and `block`.

use super::basic::decode_basic;
use super::{Options, Step};
use crate::decoder::DecodingContext;
use crate::evm::{ByteSource, SELECTOR_SIZE, Special};
use crate::format::{Location, MagicVariable, NamedValue, Payload, Type, Value, ValueError};
use crate::pointer::DataPointer;

pub(crate) fn decode_special(
    ty: &Type,
    special: Special,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    match ty {
        Type::Magic { variable } => decode_magic(ty, *variable, context, options),
        _ => decode_basic(ty, &DataPointer::Special(special), context, options),
    }
}

fn decode_magic(
    ty: &Type,
    variable: MagicVariable,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<Value> {
    let payable = Type::Address { payable: true };
    let word = Type::uint(256);
    let fields: Vec<(&str, Type, Special)> = match variable {
        MagicVariable::Message => {
            let mut members = calldata_members(context);
            members.push(member("sender", &payable, Special::Sender, context, options)?);
            members.push(member("value", &word, Special::Value, context, options)?);
            return Ok(Value::new(ty.clone(), Payload::Magic(members)));
        }
        MagicVariable::Transaction => vec![
            ("origin", payable, Special::Origin),
            ("gasprice", word, Special::GasPrice),
        ],
        MagicVariable::Block => vec![
            ("coinbase", payable, Special::Coinbase),
            ("difficulty", word.clone(), Special::Difficulty),
            ("gaslimit", word.clone(), Special::GasLimit),
            ("number", word.clone(), Special::Number),
            ("timestamp", word.clone(), Special::Timestamp),
            ("chainid", word.clone(), Special::ChainId),
            ("basefee", word, Special::BaseFee),
        ],
    };
    let mut members = Vec::with_capacity(fields.len());
    for (name, field_ty, special) in &fields {
        members.push(member(name, field_ty, *special, context, options)?);
    }
    Ok(Value::new(ty.clone(), Payload::Magic(members)))
}

fn member(
    name: &str,
    ty: &Type,
    special: Special,
    context: &DecodingContext<'_>,
    options: &Options,
) -> Step<NamedValue> {
    let lenient = Options {
        strict: false,
        ..options.clone()
    };
    Ok(NamedValue {
        name: Some(name.to_string()),
        value: decode_basic(ty, &DataPointer::Special(special), context, &lenient)?,
    })
}

/// `msg.data` and `msg.sig` come straight from resident calldata.
fn calldata_members(context: &DecodingContext<'_>) -> Vec<NamedValue> {
    let data_ty = Type::bytes().specify_location(Some(Location::Calldata));
    let sig_ty = Type::fixed_bytes(SELECTOR_SIZE as u8);
    let (data, sig) = match &context.state.calldata {
        Some(calldata) => {
            let mut sig = calldata.iter().take(SELECTOR_SIZE).copied().collect::<Vec<_>>();
            sig.resize(SELECTOR_SIZE, 0);
            (
                Value::new(data_ty, Payload::Bytes(calldata.clone())),
                Value::new(sig_ty, Payload::Bytes(sig)),
            )
        }
        None => {
            let unavailable = |length| ValueError::ReadErrorBytes {
                location: ByteSource::Calldata,
                start: 0,
                length,
            };
            (
                Value::error(data_ty, unavailable(0)),
                Value::error(sig_ty, unavailable(SELECTOR_SIZE)),
            )
        }
    };
    vec![
        NamedValue {
            name: Some("data".to_string()),
            value: data,
        },
        NamedValue {
            name: Some("sig".to_string()),
            value: sig,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocate::Allocations;
    use crate::decode::decode;
    use crate::evm::{Contexts, EvmState};
    use crate::format::UserDefinedTypes;

    #[test]
    fn test_msg() {
        let mut sender = [0u8; 32];
        sender[31] = 0x11;
        let mut value = [0u8; 32];
        value[31] = 3;
        let state = EvmState::new()
            .with_calldata(vec![0xaa, 0xbb, 0xcc, 0xdd, 0x01])
            .with_special(Special::Sender, sender)
            .with_special(Special::Value, value);
        let types = UserDefinedTypes::new();
        let allocations = Allocations::default();
        let contexts = Contexts::new();
        let context = DecodingContext::new(state, &types, &allocations, &contexts);
        let ty = Type::Magic {
            variable: MagicVariable::Message,
        };
        let decoded = decode(&ty, &DataPointer::Special(Special::Sender), &context, &Options::default()).unwrap();
        assert!(matches!(decoded.payload(), Some(Payload::Magic(_))));
        let Some(Payload::Magic(members)) = decoded.payload() else {
            return;
        };
        let names: Vec<_> = members.iter().filter_map(|member| member.name.as_deref()).collect();
        assert_eq!(names, ["data", "sig", "sender", "value"]);
        assert_eq!(members[1].value.to_string(), "0xaabbccdd");
        assert_eq!(members[3].value, Value::uint(256, 3u8));
    }

    #[test]
    fn test_missing_special_is_error_value() {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::default();
        let contexts = Contexts::new();
        let context = DecodingContext::new(EvmState::new(), &types, &allocations, &contexts);
        let value = decode(
            &Type::uint(256),
            &DataPointer::Special(Special::Number),
            &context,
            &Options::default(),
        )
        .unwrap();
        assert_eq!(
            value.as_error(),
            Some(&ValueError::ReadErrorSpecial {
                special: Special::Number
            })
        );
    }
}
