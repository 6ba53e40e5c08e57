//! Single variables.

use super::{Decoder, DecodingContext};
use crate::decode::decode;
use crate::format::{ParseTypeError, Type, Value, parse_type};
use crate::pointer::DataPointer;

/// Decode one variable given a type description such as
/// `"uint256[] memory"` or `"struct Pair storage"`.
///
/// Struct and enum names resolve against the context's user-defined types.
/// External function pointers on the stack span two words, so their
/// pointer should be `DataPointer::Stack { from, to: from + 1 }`.
pub fn decode_variable<'a>(
    description: &str,
    pointer: DataPointer,
    context: DecodingContext<'a>,
) -> Result<Decoder<'a, Value>, ParseTypeError> {
    let ty = parse_type(description, context.user_defined_types)?;
    Ok(decode_value(ty, pointer, context))
}

/// Decode one variable of an already-parsed type.
pub fn decode_value<'a>(ty: Type, pointer: DataPointer, context: DecodingContext<'a>) -> Decoder<'a, Value> {
    Decoder::start(context, move |context| {
        decode(&ty, &pointer, context, &context.base_options())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocate::Allocations;
    use crate::decoder::{DecodeError, DecoderOptions};
    use crate::evm::{Contexts, EvmState};
    use crate::format::{UserDefinedTypes, ValueError};

    #[test]
    fn test_decode_variable_parses_description() {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::new(&types);
        let contexts = Contexts::new();
        let mut word = [0u8; 32];
        word[31] = 1;
        let state = EvmState::new().with_stack(vec![word]);
        let context = DecodingContext::new(state, &types, &allocations, &contexts);
        let decoder = decode_variable("bool", DataPointer::stack(0), context).unwrap();
        assert_eq!(decoder.finish().unwrap(), Value::bool(true));
    }

    #[test]
    fn test_unknown_type_is_parse_error() {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::new(&types);
        let contexts = Contexts::new();
        let context = DecodingContext::new(EvmState::new(), &types, &allocations, &contexts);
        assert!(decode_variable("enum Missing", DataPointer::stack(0), context).is_err());
    }

    #[test]
    fn test_strict_mode_fails_instead_of_embedding() {
        let types = UserDefinedTypes::new();
        let allocations = Allocations::new(&types);
        let contexts = Contexts::new();
        let mut word = vec![0u8; 32];
        word[31] = 2;
        let context = DecodingContext::new(EvmState::new(), &types, &allocations, &contexts)
            .with_options(DecoderOptions {
                strict_abi_mode: true,
                permissive_padding: false,
            });
        let decoder = decode_value(Type::Bool, DataPointer::Literal(word), context);
        assert!(matches!(
            decoder.finish(),
            Err(DecodeError::Stopped(ValueError::BoolOutOfRange { .. }))
        ));
    }
}
