//! Conversion between the value model and its wire form
//!
//! Encoding can fail only on host-side misuse (nesting beyond the depth
//! bound, which is also how a pathologically self-referential structure
//! would present); those failures become `FunctionCallResponse.error`.
//! Decoding failures mean the compiler sent something invalid and are
//! reported as protocol violations (plain `String` descriptions here;
//! the driver escalates them).

use crate::dispatcher::Dispatcher;
use sass_protocol::messages as proto;
use sass_values::{
    ArgumentList, CalculationOperator, CalculationValue, CompilerFunction, CompilerMixin,
    ListSeparator, SassCalculation, SassColor, SassList, SassMap, SassNumber, SassString,
    Value, ValueError,
};

/// Values nested deeper than this will not encode or decode. Bounds both
/// the wire payload and the recursion below.
pub(crate) const MAX_VALUE_DEPTH: usize = 100;

pub(crate) fn separator_to_wire(separator: ListSeparator) -> proto::ListSeparator {
    match separator {
        ListSeparator::Comma => proto::ListSeparator::Comma,
        ListSeparator::Space => proto::ListSeparator::Space,
        ListSeparator::Slash => proto::ListSeparator::Slash,
        ListSeparator::Undecided => proto::ListSeparator::Undecided,
    }
}

fn separator_from_wire(raw: i32) -> Result<ListSeparator, String> {
    match proto::ListSeparator::try_from(raw) {
        Ok(proto::ListSeparator::Comma) => Ok(ListSeparator::Comma),
        Ok(proto::ListSeparator::Space) => Ok(ListSeparator::Space),
        Ok(proto::ListSeparator::Slash) => Ok(ListSeparator::Slash),
        Ok(proto::ListSeparator::Undecided) => Ok(ListSeparator::Undecided),
        Err(_) => Err(format!("Unknown list separator {}", raw)),
    }
}

/// Encode a value for the wire, allocating host-function ids as needed.
pub(crate) fn encode_value(
    value: &Value,
    functions: &Dispatcher,
    depth: usize,
) -> Result<proto::Value, ValueError> {
    if depth > MAX_VALUE_DEPTH {
        return Err(ValueError::NestingTooDeep);
    }
    let kind = match value {
        Value::Null => proto::value::Kind::Singleton(proto::SingletonValue::Null as i32),
        Value::Bool(true) => {
            proto::value::Kind::Singleton(proto::SingletonValue::True as i32)
        }
        Value::Bool(false) => {
            proto::value::Kind::Singleton(proto::SingletonValue::False as i32)
        }
        Value::String(s) => proto::value::Kind::String(proto::StringValue {
            text: s.text().to_string(),
            quoted: s.is_quoted(),
        }),
        Value::Number(n) => proto::value::Kind::Number(encode_number(n)),
        Value::Color(c) => encode_color(c),
        Value::List(list) => {
            let contents = list
                .elements()
                .iter()
                .map(|v| encode_value(v, functions, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            proto::value::Kind::List(proto::ListValue {
                separator: separator_to_wire(list.separator()) as i32,
                has_brackets: list.is_bracketed(),
                contents,
            })
        }
        Value::ArgumentList(args) => {
            let contents = args
                .elements()
                .iter()
                .map(|v| encode_value(v, functions, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            let mut keywords = std::collections::HashMap::new();
            for (name, v) in args.keywords() {
                keywords.insert(name.clone(), encode_value(v, functions, depth + 1)?);
            }
            proto::value::Kind::ArgumentList(proto::ArgumentListValue {
                separator: separator_to_wire(args.separator()) as i32,
                contents,
                keywords,
            })
        }
        Value::Map(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, val) in map {
                entries.push(proto::MapEntry {
                    key: Some(encode_value(key, functions, depth + 1)?),
                    value: Some(encode_value(val, functions, depth + 1)?),
                });
            }
            proto::value::Kind::Map(proto::MapValue { entries })
        }
        Value::Calculation(calc) => {
            proto::value::Kind::Calculation(encode_calculation(calc, depth + 1)?)
        }
        Value::CompilerFunction(f) => {
            proto::value::Kind::CompilerFunction(proto::CompilerFunctionValue {
                id: f.id(),
            })
        }
        Value::HostFunction(f) => {
            let id = functions.register_anonymous(f);
            proto::value::Kind::HostFunction(proto::HostFunctionValue {
                id,
                signature: f.signature().to_string(),
            })
        }
        Value::CompilerMixin(m) => {
            proto::value::Kind::CompilerMixin(proto::CompilerMixinValue { id: m.id() })
        }
    };
    Ok(proto::Value { kind: Some(kind) })
}

fn encode_number(number: &SassNumber) -> proto::NumberValue {
    proto::NumberValue {
        value: number.value(),
        numerators: number.numerator_units().to_vec(),
        denominators: number.denominator_units().to_vec(),
    }
}

fn encode_color(color: &SassColor) -> proto::value::Kind {
    if color.is_hsl() {
        proto::value::Kind::HslColor(proto::HslColor {
            hue: color.hue(),
            saturation: color.saturation(),
            lightness: color.lightness(),
            alpha: color.alpha(),
        })
    } else if color.is_hwb() {
        proto::value::Kind::HwbColor(proto::HwbColor {
            hue: color.hue(),
            whiteness: color.whiteness(),
            blackness: color.blackness(),
            alpha: color.alpha(),
        })
    } else {
        proto::value::Kind::RgbColor(proto::RgbColor {
            red: u32::from(color.red()),
            green: u32::from(color.green()),
            blue: u32::from(color.blue()),
            alpha: color.alpha(),
        })
    }
}

fn encode_calculation(
    calc: &SassCalculation,
    depth: usize,
) -> Result<proto::CalculationValue, ValueError> {
    if depth > MAX_VALUE_DEPTH {
        return Err(ValueError::NestingTooDeep);
    }
    Ok(proto::CalculationValue {
        name: calc.name().to_string(),
        arguments: calc
            .arguments()
            .iter()
            .map(|a| encode_operand(a, depth + 1))
            .collect::<Result<Vec<_>, _>>()?,
    })
}

fn encode_operand(
    operand: &CalculationValue,
    depth: usize,
) -> Result<proto::CalculationOperand, ValueError> {
    if depth > MAX_VALUE_DEPTH {
        return Err(ValueError::NestingTooDeep);
    }
    let kind = match operand {
        CalculationValue::Number(n) => {
            proto::calculation_operand::Kind::Number(encode_number(n))
        }
        CalculationValue::String(s) => {
            proto::calculation_operand::Kind::String(s.clone())
        }
        CalculationValue::Calculation(c) => {
            proto::calculation_operand::Kind::Calculation(encode_calculation(
                c,
                depth + 1,
            )?)
        }
        CalculationValue::Operation { operator, lhs, rhs } => {
            proto::calculation_operand::Kind::Operation(Box::new(
                proto::CalculationOperation {
                    operator: operator_to_wire(*operator) as i32,
                    lhs: Some(Box::new(encode_operand(lhs, depth + 1)?)),
                    rhs: Some(Box::new(encode_operand(rhs, depth + 1)?)),
                },
            ))
        }
    };
    Ok(proto::CalculationOperand { kind: Some(kind) })
}

fn operator_to_wire(op: CalculationOperator) -> proto::CalculationOperator {
    match op {
        CalculationOperator::Plus => proto::CalculationOperator::Plus,
        CalculationOperator::Minus => proto::CalculationOperator::Minus,
        CalculationOperator::Times => proto::CalculationOperator::Times,
        CalculationOperator::Divide => proto::CalculationOperator::Divide,
    }
}

/// Decode a wire value. Errors are protocol-violation descriptions.
pub(crate) fn decode_value(
    wire: proto::Value,
    functions: &Dispatcher,
    depth: usize,
) -> Result<Value, String> {
    if depth > MAX_VALUE_DEPTH {
        return Err("Value nesting exceeds the supported depth".to_string());
    }
    let kind = wire.kind.ok_or("Value has no kind set")?;
    match kind {
        proto::value::Kind::Singleton(raw) => match proto::SingletonValue::try_from(raw) {
            Ok(proto::SingletonValue::True) => Ok(Value::TRUE),
            Ok(proto::SingletonValue::False) => Ok(Value::FALSE),
            Ok(proto::SingletonValue::Null) => Ok(Value::Null),
            Err(_) => Err(format!("Unknown singleton value {}", raw)),
        },
        proto::value::Kind::String(s) => Ok(Value::String(if s.quoted {
            SassString::new(s.text)
        } else {
            SassString::unquoted(s.text)
        })),
        proto::value::Kind::Number(n) => Ok(Value::Number(decode_number(n)?)),
        proto::value::Kind::RgbColor(c) => {
            let color = SassColor::rgba(
                i64::from(c.red),
                i64::from(c.green),
                i64::from(c.blue),
                c.alpha,
            )
            .map_err(|e| format!("Invalid RGB color from compiler: {}", e))?;
            Ok(Value::Color(color))
        }
        proto::value::Kind::HslColor(c) => {
            let color = SassColor::hsla(c.hue, c.saturation, c.lightness, c.alpha)
                .map_err(|e| format!("Invalid HSL color from compiler: {}", e))?;
            Ok(Value::Color(color))
        }
        proto::value::Kind::HwbColor(c) => {
            let color = SassColor::hwba(c.hue, c.whiteness, c.blackness, c.alpha)
                .map_err(|e| format!("Invalid HWB color from compiler: {}", e))?;
            Ok(Value::Color(color))
        }
        proto::value::Kind::List(list) => {
            let elements = list
                .contents
                .into_iter()
                .map(|v| decode_value(v, functions, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            let separator = separator_from_wire(list.separator)?;
            let sass_list = SassList::new(elements, separator, list.has_brackets)
                .map_err(|e| format!("Invalid list from compiler: {}", e))?;
            Ok(Value::List(sass_list))
        }
        proto::value::Kind::ArgumentList(args) => {
            let elements = args
                .contents
                .into_iter()
                .map(|v| decode_value(v, functions, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            let separator = separator_from_wire(args.separator)?;
            let mut keywords = indexmap::IndexMap::new();
            // HashMap order off the wire is arbitrary; sort for stability
            let mut pairs: Vec<(String, proto::Value)> =
                args.keywords.into_iter().collect();
            pairs.sort_by(|(a, _), (b, _)| a.cmp(b));
            for (name, v) in pairs {
                keywords.insert(name, decode_value(v, functions, depth + 1)?);
            }
            Ok(Value::ArgumentList(ArgumentList::new(
                elements, keywords, separator,
            )))
        }
        proto::value::Kind::Map(map) => {
            let mut result = SassMap::new();
            for entry in map.entries {
                let key = entry.key.ok_or("Map entry has no key")?;
                let value = entry.value.ok_or("Map entry has no value")?;
                result.insert(
                    decode_value(key, functions, depth + 1)?,
                    decode_value(value, functions, depth + 1)?,
                );
            }
            Ok(Value::Map(result))
        }
        proto::value::Kind::Calculation(calc) => {
            Ok(Value::Calculation(decode_calculation(calc, depth + 1)?))
        }
        proto::value::Kind::CompilerFunction(f) => {
            Ok(Value::CompilerFunction(CompilerFunction::new(f.id)))
        }
        proto::value::Kind::HostFunction(f) => functions
            .anonymous(f.id)
            .map(Value::HostFunction)
            .ok_or_else(|| format!("Unknown host function id {}", f.id)),
        proto::value::Kind::CompilerMixin(m) => {
            Ok(Value::CompilerMixin(CompilerMixin::new(m.id)))
        }
    }
}

fn decode_number(wire: proto::NumberValue) -> Result<SassNumber, String> {
    SassNumber::with_units(wire.value, wire.numerators, wire.denominators)
        .map_err(|e| format!("Invalid number from compiler: {}", e))
}

fn decode_calculation(
    wire: proto::CalculationValue,
    depth: usize,
) -> Result<SassCalculation, String> {
    if depth > MAX_VALUE_DEPTH {
        return Err("Calculation nesting exceeds the supported depth".to_string());
    }
    let arguments = wire
        .arguments
        .into_iter()
        .map(|a| decode_operand(a, depth + 1))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SassCalculation::new(wire.name, arguments))
}

fn decode_operand(
    wire: proto::CalculationOperand,
    depth: usize,
) -> Result<CalculationValue, String> {
    if depth > MAX_VALUE_DEPTH {
        return Err("Calculation nesting exceeds the supported depth".to_string());
    }
    match wire.kind.ok_or("Calculation operand has no kind set")? {
        proto::calculation_operand::Kind::Number(n) => {
            Ok(CalculationValue::Number(decode_number(n)?))
        }
        proto::calculation_operand::Kind::String(s) => Ok(CalculationValue::String(s)),
        proto::calculation_operand::Kind::Calculation(c) => Ok(
            CalculationValue::Calculation(decode_calculation(c, depth + 1)?),
        ),
        proto::calculation_operand::Kind::Operation(op) => {
            let operator = match proto::CalculationOperator::try_from(op.operator) {
                Ok(proto::CalculationOperator::Plus) => CalculationOperator::Plus,
                Ok(proto::CalculationOperator::Minus) => CalculationOperator::Minus,
                Ok(proto::CalculationOperator::Times) => CalculationOperator::Times,
                Ok(proto::CalculationOperator::Divide) => CalculationOperator::Divide,
                Err(_) => {
                    return Err(format!("Unknown calculation operator {}", op.operator));
                }
            };
            let lhs = op.lhs.ok_or("Calculation operation has no lhs")?;
            let rhs = op.rhs.ok_or("Calculation operation has no rhs")?;
            Ok(CalculationValue::Operation {
                operator,
                lhs: Box::new(decode_operand(*lhs, depth + 1)?),
                rhs: Box::new(decode_operand(*rhs, depth + 1)?),
            })
        }
    }
}
