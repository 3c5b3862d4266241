use crate::Expression;

pub fn raw(value: impl Into<String>) -> Expression {
    Expression::Raw(value.into())
}

/// A variable reference. The name is given without its leading `$`.
pub fn reference(name: impl Into<String>) -> Expression {
    Expression::Reference(name.into())
}

pub fn qref(expression: impl Into<Expression>) -> Expression {
    Expression::QuietReference(Box::new(expression.into()))
}

pub fn string(value: impl Into<String>) -> Expression {
    Expression::Str(value.into())
}

pub fn int(value: i64) -> Expression {
    Expression::Int(value)
}

pub fn boolean(value: bool) -> Expression {
    Expression::Bool(value)
}

pub fn null() -> Expression {
    Expression::Null
}

pub fn obj<K: Into<String>>(attributes: impl IntoIterator<Item = (K, Expression)>) -> Expression {
    Expression::Object(attributes.into_iter().map(|(key, value)| (key.into(), value)).collect())
}

/// An object without attributes, printed as `{}`.
pub fn empty_obj() -> Expression {
    Expression::Object(Vec::new())
}

pub fn list(values: impl IntoIterator<Item = Expression>) -> Expression {
    Expression::List(values.into_iter().collect())
}

pub fn empty_list() -> Expression {
    Expression::List(Vec::new())
}

pub fn set(key: Expression, value: Expression) -> Expression {
    Expression::Set {
        key: Box::new(key),
        value: Box::new(value),
    }
}

pub fn iff(predicate: Expression, expression: Expression) -> Expression {
    Expression::If {
        predicate: Box::new(predicate),
        expression: Box::new(expression),
        inline: false,
    }
}

/// Same as [`iff`], printed on a single line.
pub fn iff_inline(predicate: Expression, expression: Expression) -> Expression {
    Expression::If {
        predicate: Box::new(predicate),
        expression: Box::new(expression),
        inline: true,
    }
}

pub fn if_else(predicate: Expression, then: Expression, otherwise: Expression) -> Expression {
    Expression::IfElse {
        predicate: Box::new(predicate),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
    }
}

pub fn for_each(key: Expression, collection: Expression, body: impl IntoIterator<Item = Expression>) -> Expression {
    Expression::ForEach {
        key: Box::new(key),
        collection: Box::new(collection),
        body: body.into_iter().collect(),
    }
}

pub fn compound(expressions: impl IntoIterator<Item = Expression>) -> Expression {
    Expression::Compound(expressions.into_iter().collect())
}

pub fn block(name: impl Into<String>, expressions: impl IntoIterator<Item = Expression>) -> Expression {
    Expression::Block {
        name: name.into(),
        expressions: expressions.into_iter().collect(),
    }
}

pub fn method_call(method: Expression, params: impl IntoIterator<Item = Expression>) -> Expression {
    Expression::MethodCall {
        method: Box::new(method),
        params: params.into_iter().collect(),
    }
}

pub fn and(expressions: impl IntoIterator<Item = Expression>) -> Expression {
    Expression::And(expressions.into_iter().collect())
}

pub fn or(expressions: impl IntoIterator<Item = Expression>) -> Expression {
    Expression::Or(expressions.into_iter().collect())
}

pub fn parens(expression: Expression) -> Expression {
    Expression::Parens(Box::new(expression))
}

pub fn not(expression: Expression) -> Expression {
    Expression::Not(Box::new(expression))
}

pub fn equals(left: Expression, right: Expression) -> Expression {
    Expression::Equals(Box::new(left), Box::new(right))
}

pub fn not_equals(left: Expression, right: Expression) -> Expression {
    Expression::NotEquals(Box::new(left), Box::new(right))
}

pub fn to_json(expression: Expression) -> Expression {
    Expression::ToJson(Box::new(expression))
}

pub fn comment(text: impl Into<String>) -> Expression {
    Expression::Comment(text.into())
}

impl From<&str> for Expression {
    fn from(value: &str) -> Self {
        Expression::Raw(value.to_string())
    }
}

impl From<String> for Expression {
    fn from(value: String) -> Self {
        Expression::Raw(value)
    }
}
