//! Expression evaluator
//!
//! Parses template expressions with oxc and evaluates the subset render
//! expressions use against a JSON state object: member access, literals,
//! logical/comparison/arithmetic operators, ternaries, sequences and
//! assignments to `_cache` slots.

use oxc_allocator::Allocator;
use oxc_ast::ast::{AssignmentTarget, Expression};
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::operator::{AssignmentOperator, BinaryOperator, LogicalOperator, UnaryOperator};
use serde_json::{Map, Number, Value};

/// Bindings visible to an expression. Identifiers resolve against `state`;
/// `_cache` is the render instance's slot storage.
pub struct Scope<'s> {
    pub state: &'s Value,
    pub cache: &'s mut Map<String, Value>,
}

/// Check that `source` parses as a single JavaScript expression.
pub fn validate_expression(source: &str) -> Result<(), String> {
    let allocator = Allocator::default();
    Parser::new(&allocator, source, SourceType::default())
        .parse_expression()
        .map(|_| ())
        .map_err(|errors| format!("Invalid expression syntax: {:?}", errors))
}

pub fn evaluate(source: &str, scope: &mut Scope) -> Result<Value, String> {
    let allocator = Allocator::default();
    let expr = Parser::new(&allocator, source, SourceType::default())
        .parse_expression()
        .map_err(|errors| format!("Invalid expression syntax: {:?}", errors))?;
    eval_expr(&expr, scope)
}

/// JavaScript truthiness of a JSON value.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `toDisplayString`: null renders empty, objects render as JSON.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string_pretty(value).unwrap_or_default(),
        other => other.to_string(),
    }
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn member(object: &Value, key: &str) -> Value {
    match object {
        Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
        Value::Array(items) if key == "length" => Value::from(items.len()),
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Null),
        Value::String(s) if key == "length" => Value::from(s.chars().count()),
        _ => Value::Null,
    }
}

fn property_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => to_display_string(other),
    }
}

fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            to_number(left) == to_number(right)
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn eval_expr(expr: &Expression, scope: &mut Scope) -> Result<Value, String> {
    match expr {
        Expression::BooleanLiteral(lit) => Ok(Value::Bool(lit.value)),
        Expression::NullLiteral(_) => Ok(Value::Null),
        Expression::NumericLiteral(lit) => Ok(number(lit.value)),
        Expression::StringLiteral(lit) => Ok(Value::String(lit.value.to_string())),
        Expression::Identifier(ident) => {
            let name = ident.name.as_str();
            Ok(match name {
                "_cache" => Value::Object(scope.cache.clone()),
                "undefined" => Value::Null,
                _ => member(scope.state, name),
            })
        }
        Expression::ParenthesizedExpression(paren) => eval_expr(&paren.expression, scope),
        Expression::StaticMemberExpression(m) => {
            let object = eval_expr(&m.object, scope)?;
            Ok(member(&object, m.property.name.as_str()))
        }
        Expression::ComputedMemberExpression(m) => {
            let object = eval_expr(&m.object, scope)?;
            let key = eval_expr(&m.expression, scope)?;
            Ok(member(&object, &property_key(&key)))
        }
        Expression::UnaryExpression(unary) => {
            let argument = eval_expr(&unary.argument, scope)?;
            match unary.operator {
                UnaryOperator::LogicalNot => Ok(Value::Bool(!truthy(&argument))),
                UnaryOperator::UnaryNegation => Ok(number(-to_number(&argument))),
                UnaryOperator::UnaryPlus => Ok(number(to_number(&argument))),
                other => Err(format!("unsupported unary operator {:?}", other)),
            }
        }
        Expression::LogicalExpression(logical) => {
            let left = eval_expr(&logical.left, scope)?;
            match logical.operator {
                LogicalOperator::Or if truthy(&left) => Ok(left),
                LogicalOperator::And if !truthy(&left) => Ok(left),
                LogicalOperator::Coalesce if !left.is_null() => Ok(left),
                _ => eval_expr(&logical.right, scope),
            }
        }
        Expression::BinaryExpression(binary) => {
            let left = eval_expr(&binary.left, scope)?;
            let right = eval_expr(&binary.right, scope)?;
            eval_binary(binary.operator, &left, &right)
        }
        Expression::ConditionalExpression(cond) => {
            if truthy(&eval_expr(&cond.test, scope)?) {
                eval_expr(&cond.consequent, scope)
            } else {
                eval_expr(&cond.alternate, scope)
            }
        }
        Expression::SequenceExpression(seq) => {
            let mut last = Value::Null;
            for e in seq.expressions.iter() {
                last = eval_expr(e, scope)?;
            }
            Ok(last)
        }
        Expression::AssignmentExpression(assign) => {
            if assign.operator != AssignmentOperator::Assign {
                return Err("only plain assignment is supported".to_string());
            }
            let AssignmentTarget::StaticMemberExpression(target) = &assign.left else {
                return Err("only `_cache.<key> = value` assignments are supported".to_string());
            };
            let Expression::Identifier(object) = &target.object else {
                return Err("only `_cache.<key> = value` assignments are supported".to_string());
            };
            if object.name.as_str() != "_cache" {
                return Err(format!("cannot assign to `{}`", object.name.as_str()));
            }
            let value = eval_expr(&assign.right, scope)?;
            scope.cache.insert(target.property.name.to_string(), value.clone());
            Ok(value)
        }
        _ => Err("unsupported expression".to_string()),
    }
}

fn eval_binary(operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value, String> {
    let value = match operator {
        BinaryOperator::StrictEquality => Value::Bool(left == right),
        BinaryOperator::StrictInequality => Value::Bool(left != right),
        BinaryOperator::Equality => Value::Bool(loose_equals(left, right)),
        BinaryOperator::Inequality => Value::Bool(!loose_equals(left, right)),
        BinaryOperator::LessThan => Value::Bool(to_number(left) < to_number(right)),
        BinaryOperator::LessEqualThan => Value::Bool(to_number(left) <= to_number(right)),
        BinaryOperator::GreaterThan => Value::Bool(to_number(left) > to_number(right)),
        BinaryOperator::GreaterEqualThan => Value::Bool(to_number(left) >= to_number(right)),
        BinaryOperator::Addition => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(format!("{}{}", to_display_string(left), to_display_string(right)))
            }
            _ => number(to_number(left) + to_number(right)),
        },
        BinaryOperator::Subtraction => number(to_number(left) - to_number(right)),
        BinaryOperator::Multiplication => number(to_number(left) * to_number(right)),
        BinaryOperator::Division => number(to_number(left) / to_number(right)),
        BinaryOperator::Remainder => number(to_number(left) % to_number(right)),
        other => return Err(format!("unsupported binary operator {:?}", other)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(source: &str, state: Value) -> Value {
        let mut cache = Map::new();
        let mut scope = Scope {
            state: &state,
            cache: &mut cache,
        };
        evaluate(source, &mut scope).unwrap()
    }

    #[test]
    fn test_member_paths_and_logic() {
        let state = json!({ "user": { "loggedIn": true, "name": "ada" }, "items": [1, 2] });
        assert_eq!(eval("user.loggedIn", state.clone()), json!(true));
        assert_eq!(eval("user['name']", state.clone()), json!("ada"));
        assert_eq!(eval("items.length > 1 && !missing", state.clone()), json!(true));
        assert_eq!(eval("missing ?? 'fallback'", state.clone()), json!("fallback"));
        assert_eq!(eval("items[0] === 1 ? 'one' : 'other'", state), json!("one"));
    }

    #[test]
    fn test_cache_assignment() {
        let state = json!({});
        let mut cache = Map::new();
        {
            let mut scope = Scope {
                state: &state,
                cache: &mut cache,
            };
            let value = evaluate("(_cache._lz_if_0 = true, _cache._lz_if_0 || false)", &mut scope).unwrap();
            assert_eq!(value, json!(true));
        }
        assert_eq!(cache.get("_lz_if_0"), Some(&json!(true)));
    }

    #[test]
    fn test_rejects_state_assignment() {
        let state = json!({ "a": 1 });
        let mut cache = Map::new();
        let mut scope = Scope {
            state: &state,
            cache: &mut cache,
        };
        assert!(evaluate("a = 2", &mut scope).is_err());
    }

    #[test]
    fn test_validate_expression() {
        assert!(validate_expression("a > b && c").is_ok());
        assert!(validate_expression("a >").is_err());
    }

    #[test]
    fn test_display_string() {
        assert_eq!(to_display_string(&json!(null)), "");
        assert_eq!(to_display_string(&json!(3)), "3");
        assert_eq!(to_display_string(&json!("x")), "x");
    }
}
