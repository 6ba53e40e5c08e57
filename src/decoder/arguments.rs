//! Argument lists with full→ABI degradation.
//!
//! Arguments are decoded in full mode (structs, enums, contracts) while the
//! layouts allow it. The first retryable failure switches the whole list to
//! ABI mode: the failed argument is decoded again from its abified type and
//! every argument already decoded is abified, so a result never mixes modes.

use super::DecodingContext;
use crate::allocate::DecodingMode;
use crate::decode::{Interrupt, Options, Step, decode};
use crate::format::{NamedValue, Type};
use crate::logging::info;
use crate::pointer::DataPointer;

pub(crate) struct ArgumentSpec {
    pub name: Option<String>,
    pub ty: Type,
    pub pointer: DataPointer,
}

pub(crate) fn decode_arguments(
    specs: &[ArgumentSpec],
    mode: DecodingMode,
    context: &DecodingContext<'_>,
    base_options: &Options,
) -> Step<(Vec<NamedValue>, DecodingMode)> {
    let abified = |ty: &Type| ty.abify(context.user_defined_types).unwrap_or_else(|| ty.clone());
    let mut mode = mode;
    let mut values = Vec::with_capacity(specs.len());
    for spec in specs {
        let value = match mode {
            DecodingMode::Abi => decode(&abified(&spec.ty), &spec.pointer, context, base_options)?,
            DecodingMode::Full => {
                let full_options = Options {
                    allow_retry: true,
                    ..base_options.clone()
                };
                match decode(&spec.ty, &spec.pointer, context, &full_options) {
                    Ok(value) => value,
                    Err(Interrupt::Stop {
                        allow_retry: true, ..
                    }) => {
                        info!(argument = spec.name.as_deref().unwrap_or(""), "degrading to ABI mode");
                        mode = DecodingMode::Abi;
                        decode(&abified(&spec.ty), &spec.pointer, context, base_options)?
                    }
                    Err(other) => return Err(other),
                }
            }
        };
        values.push(NamedValue {
            name: spec.name.clone(),
            value,
        });
    }
    if mode == DecodingMode::Abi {
        for named in &mut values {
            named.value = named.value.abify(context.user_defined_types);
        }
    }
    Ok((values, mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocate::Allocations;
    use crate::conversion::usize_to_word;
    use crate::evm::{Contexts, EvmState};
    use crate::format::{Payload, StructDefinition, UserDefinedTypes, Value};

    #[test]
    fn test_degrades_when_struct_layout_missing() {
        let mut types = UserDefinedTypes::new();
        let point = StructDefinition::new("point", "Point")
            .member("x", Type::uint(256))
            .member("y", Type::uint(256));
        let point_ty = Type::struct_of(&point);
        types.insert_struct(point);
        // layouts computed before the definition was known
        let allocations = Allocations::new(&UserDefinedTypes::new());
        let contexts = Contexts::new();
        let mut calldata = usize_to_word(1);
        calldata.extend(usize_to_word(2));
        calldata.extend(usize_to_word(3));
        let context = DecodingContext::new(EvmState::new().with_calldata(calldata), &types, &allocations, &contexts);
        let specs = vec![
            ArgumentSpec {
                name: Some("a".to_string()),
                ty: Type::uint(256),
                pointer: DataPointer::calldata(0, 32),
            },
            ArgumentSpec {
                name: Some("p".to_string()),
                ty: point_ty,
                pointer: DataPointer::calldata(32, 64),
            },
        ];
        let options = Options {
            strict: true,
            ..Options::default()
        };
        let (values, mode) = decode_arguments(&specs, DecodingMode::Full, &context, &options).unwrap();
        assert_eq!(mode, DecodingMode::Abi);
        assert_eq!(values[0].value, Value::uint(256, 1u8));
        assert!(matches!(values[1].value.payload(), Some(Payload::Tuple(members)) if members.len() == 2));
        assert_eq!(values[1].value.to_string(), "( x: 2, y: 3)");
    }
}
