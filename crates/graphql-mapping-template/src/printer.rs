use crate::Expression;

const TAB: &str = "  ";

/// Renders an expression as template text.
pub fn print(expression: &Expression) -> String {
    print_expression(expression, "")
}

/// Renders an expression wrapped in `## [Start] <name>. **` / `## [End] <name>. **` markers.
pub fn print_block(name: &str, expression: &Expression) -> String {
    format!("## [Start] {name}. **\n{}\n## [End] {name}. **", print(expression))
}

/// Statement position: every line starts with `indent`.
fn print_expression(expression: &Expression, indent: &str) -> String {
    match expression {
        Expression::Set { key, value } => {
            format!("{indent}#set( {} = {} )", print_value(key, indent), print_value(value, indent))
        }
        Expression::If {
            predicate,
            expression,
            inline: true,
        } => format!(
            "{indent}#if( {} ) {} #end",
            print_value(predicate, indent),
            print_expression(expression, "")
        ),
        Expression::If {
            predicate,
            expression,
            inline: false,
        } => {
            let nested = format!("{indent}{TAB}");
            format!(
                "{indent}#if( {} )\n{}\n{indent}#end",
                print_value(predicate, indent),
                print_expression(expression, &nested)
            )
        }
        Expression::IfElse {
            predicate,
            then,
            otherwise,
        } => {
            let nested = format!("{indent}{TAB}");
            format!(
                "{indent}#if( {} )\n{}\n{indent}#else\n{}\n{indent}#end",
                print_value(predicate, indent),
                print_expression(then, &nested),
                print_expression(otherwise, &nested)
            )
        }
        Expression::ForEach { key, collection, body } => {
            let nested = format!("{indent}{TAB}");
            let body = body
                .iter()
                .map(|expression| print_expression(expression, &nested))
                .collect::<Vec<_>>()
                .join("\n");

            format!(
                "{indent}#foreach( {} in {} )\n{body}\n{indent}#end",
                print_value(key, indent),
                print_value(collection, indent)
            )
        }
        Expression::Compound(expressions) => expressions
            .iter()
            .map(|expression| print_expression(expression, indent))
            .collect::<Vec<_>>()
            .join("\n"),
        Expression::Block { name, expressions } => {
            let mut lines = vec![format!("{indent}## [Start] {name}. **")];
            lines.extend(expressions.iter().map(|expression| print_expression(expression, indent)));
            lines.push(format!("{indent}## [End] {name}. **"));
            lines.join("\n")
        }
        Expression::Comment(text) => format!("{indent}## {text} **"),
        value => format!("{indent}{}", print_value(value, indent)),
    }
}

/// Value position: the first line is not indented, nested lines are relative to `indent`.
fn print_value(expression: &Expression, indent: &str) -> String {
    match expression {
        Expression::Raw(value) => value.clone(),
        Expression::Reference(name) => format!("${name}"),
        Expression::QuietReference(inner) => format!("$util.qr({})", print_value(inner, indent)),
        Expression::Str(value) => format!("\"{value}\""),
        Expression::Int(value) => value.to_string(),
        Expression::Bool(value) => value.to_string(),
        Expression::Null => "null".to_string(),
        Expression::Object(attributes) if attributes.is_empty() => "{}".to_string(),
        Expression::Object(attributes) => {
            let nested = format!("{indent}{TAB}");
            let attributes = attributes
                .iter()
                .map(|(key, value)| format!("{nested}\"{key}\": {}", print_value(value, &nested)))
                .collect::<Vec<_>>()
                .join(",\n");

            format!("{{\n{attributes}\n{indent}}}")
        }
        Expression::List(values) => {
            let values = values
                .iter()
                .map(|value| print_value(value, indent))
                .collect::<Vec<_>>()
                .join(", ");

            format!("[{values}]")
        }
        Expression::MethodCall { method, params } => {
            let params = params
                .iter()
                .map(|param| print_value(param, indent))
                .collect::<Vec<_>>()
                .join(", ");

            format!("{}({params})", print_value(method, indent))
        }
        Expression::And(expressions) => join_values(expressions, " && ", indent),
        Expression::Or(expressions) => join_values(expressions, " || ", indent),
        Expression::Parens(inner) => format!("({})", print_value(inner, indent)),
        Expression::Not(inner) => format!("!{}", print_value(inner, indent)),
        Expression::Equals(left, right) => {
            format!("{} == {}", print_value(left, indent), print_value(right, indent))
        }
        Expression::NotEquals(left, right) => {
            format!("{} != {}", print_value(left, indent), print_value(right, indent))
        }
        Expression::ToJson(inner) => format!("$util.toJson({})", print_value(inner, indent)),
        statement => print_expression(statement, ""),
    }
}

fn join_values(expressions: &[Expression], separator: &str, indent: &str) -> String {
    expressions
        .iter()
        .map(|expression| print_value(expression, indent))
        .collect::<Vec<_>>()
        .join(separator)
}
