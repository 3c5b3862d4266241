//! Template fragments enforcing and querying custom keys.

use graphql_mapping_template::{
    and, block, boolean, compound, empty_obj, for_each, if_else, iff, iff_inline, list, method_call, obj, print,
    print_block, qref, raw, reference, set, string, Expression,
};

use crate::{
    error::{KeyOperation, TemplateArgumentError},
    key_schema::{composite_argument_name, composite_attribute_name, composite_attribute_value, AttributeType, KeyFields},
    rules::index_directive::IndexConfig,
    schema_types::SchemaTypes,
};

pub const MODEL_QUERY_EXPRESSION: &str = "modelQueryExpression";
pub const MODEL_OBJECT_KEY: &str = "modelObjectKey";
pub const DYNAMODB_NAME_OVERRIDE_MAP: &str = "dynamodbNameOverrideMap";
pub const HAS_SEEN_SOME_KEY_ARG: &str = "hasSeenSomeKeyArg";
pub const DEFAULT_PAGE_LIMIT: i64 = 100;

const SORT_KEY_COMPARISONS: [(&str, &str); 5] = [("eq", "="), ("lt", "<"), ("le", "<="), ("gt", ">"), ("ge", ">=")];

/// Stashes the DynamoDB key of the item, read from the arguments or from the merged mutation input.
pub fn set_primary_key_snippet(key: &KeyFields, is_mutation: bool) -> String {
    let statement = qref(method_call(
        reference("ctx.stash.metadata.put"),
        [string(MODEL_OBJECT_KEY), model_object_key(key, is_mutation)],
    ));

    print_block("Set the primary key", &compound([statement]))
}

fn model_object_key(key: &KeyFields, is_mutation: bool) -> Expression {
    let prefix = if is_mutation { "mergedValues" } else { "ctx.args" };
    let to_dynamodb = |field: &str| reference(format!("util.dynamodb.toDynamoDB(${prefix}.{field})"));

    let mut attributes = vec![(key.field.name.clone(), to_dynamodb(&key.field.name))];

    match key.sort_key.as_slice() {
        [] => {}
        [single] => attributes.push((single.name.clone(), to_dynamodb(&single.name))),
        _ => {
            let names = key.sort_key_fields();
            attributes.push((
                composite_attribute_name(names.iter().copied()),
                reference(format!(
                    "util.dynamodb.toDynamoDB(\"{}\")",
                    composite_attribute_value(names.iter().copied(), prefix)
                )),
            ));
        }
    }

    obj(attributes)
}

/// Keeps the stored composite sort key in line with its parts. Empty below two sort fields.
///
/// With `conditionally_set_sort_key`, the key is only rewritten once some part of it was seen in the input,
/// which [`validate_index_argument_snippet`] records.
pub fn ensure_composite_key_snippet(key: &KeyFields, conditionally_set_sort_key: bool) -> String {
    if key.sort_key.len() < 2 {
        return String::new();
    }

    let names = key.sort_key_fields();
    let condensed_sort_key = composite_attribute_name(names.iter().copied());
    let dynamodb_friendly_name = composite_argument_name(names.iter().copied());
    let condensed_sort_key_value = composite_attribute_value(names.iter().copied(), "mergedValues");

    let put_sort_key = qref(raw(format!(
        "$ctx.args.input.put('{condensed_sort_key}',\"{condensed_sort_key_value}\")"
    )));

    print(&compound([
        if_else(
            raw(format!("$util.isNull($ctx.stash.metadata.{DYNAMODB_NAME_OVERRIDE_MAP})")),
            qref(method_call(
                reference("ctx.stash.metadata.put"),
                [
                    string(DYNAMODB_NAME_OVERRIDE_MAP),
                    raw(format!("{{ '{condensed_sort_key}': \"{dynamodb_friendly_name}\" }}")),
                ],
            )),
            qref(method_call(
                reference(format!("ctx.stash.metadata.{DYNAMODB_NAME_OVERRIDE_MAP}.put")),
                [raw(format!("'{condensed_sort_key}'")), string(dynamodb_friendly_name)],
            )),
        ),
        if conditionally_set_sort_key {
            iff(reference(HAS_SEEN_SOME_KEY_ARG), put_sort_key)
        } else {
            put_sort_key
        },
    ]))
}

/// Fails a mutation touching part of a composite sort key without providing all of it. Empty below two sort fields.
pub fn validate_index_argument_snippet(index: &IndexConfig, operation: KeyOperation) -> String {
    let names = index.sort_key_fields();

    if names.len() < 2 {
        return String::new();
    }

    let error = TemplateArgumentError::PartialCompositeKey {
        operation,
        index: index.name.clone(),
    };

    print_block(
        &format!("Validate {operation} mutation for @index '{}'", index.name),
        &compound([
            set(reference(HAS_SEEN_SOME_KEY_ARG), boolean(false)),
            set(reference("keyFieldNames"), list(names.into_iter().map(string))),
            for_each(
                reference("keyFieldName"),
                reference("keyFieldNames"),
                [iff_inline(
                    raw("$mergedValues.containsKey(\"$keyFieldName\")"),
                    set(reference(HAS_SEEN_SOME_KEY_ARG), boolean(true)),
                )],
            ),
            for_each(
                reference("keyFieldName"),
                reference("keyFieldNames"),
                [iff(
                    raw(format!(
                        "${HAS_SEEN_SOME_KEY_ARG} && !$mergedValues.containsKey(\"$keyFieldName\")"
                    )),
                    raw(error.to_template_call(false)),
                )],
            ),
        ]),
    )
}

/// `$mergedValues`: stashed default values overridden by the mutation input.
pub fn merge_inputs_and_defaults_snippet() -> String {
    print_block(
        "Merge default values and inputs",
        &compound([
            set(
                reference("mergedValues"),
                method_call(
                    reference("util.defaultIfNull"),
                    [reference("ctx.stash.defaultValues"), empty_obj()],
                ),
            ),
            qref(method_call(
                reference("mergedValues.putAll"),
                [method_call(
                    reference("util.defaultIfNull"),
                    [reference("ctx.args.input"), empty_obj()],
                )],
            )),
        ]),
    )
}

/// Builds `$modelQueryExpression` from the key arguments of a list or index query.
pub fn set_query_snippet(key: &KeyFields, types: &SchemaTypes<'_>, is_list_resolver: bool) -> Expression {
    let mut expressions = validate_sort_direction_input(key, is_list_resolver);

    expressions.push(set(reference(MODEL_QUERY_EXPRESSION), empty_obj()));
    expressions.push(apply_key_expression_for_composite_key(key, types, MODEL_QUERY_EXPRESSION));

    block("Set query expression for key", expressions)
}

pub fn validate_sort_direction_input(key: &KeyFields, is_list_resolver: bool) -> Vec<Expression> {
    if key.sort_key.is_empty() {
        return vec![iff(
            raw("!$util.isNull($ctx.args.sortDirection)"),
            raw(TemplateArgumentError::SortDirectionWithoutSortKey.to_template_call(true)),
        )];
    }

    if !is_list_resolver {
        return Vec::new();
    }

    let partition_key = &key.field.name;
    let error = TemplateArgumentError::SortDirectionWithoutPartitionKey {
        key: partition_key.clone(),
    };

    vec![iff(
        and([
            raw(format!("$util.isNull($ctx.args.{partition_key})")),
            raw("!$util.isNull($ctx.args.sortDirection)"),
        ]),
        raw(error.to_template_call(true)),
    )]
}

/// The key condition of a query: equality on the partition key, then an optional sort key condition.
///
/// A composite sort key is queried through a single argument whose operators take one value per sort field.
pub fn apply_key_expression_for_composite_key(
    key: &KeyFields,
    types: &SchemaTypes<'_>,
    query_expr_reference: &str,
) -> Expression {
    let mut expressions = Vec::new();

    if let Some(validation) = validate_key_arguments(key) {
        expressions.push(validation);
    }

    let partition_key = &key.field.name;
    let partition_key_type = types.attribute_type(&key.field.ty);

    expressions.push(iff(
        raw(format!("!$util.isNull($ctx.args.{partition_key})")),
        compound([
            set(
                reference(format!("{query_expr_reference}.expression")),
                string(format!("#{partition_key} = :{partition_key}")),
            ),
            set(
                reference(format!("{query_expr_reference}.expressionNames")),
                obj([(format!("#{partition_key}"), string(partition_key))]),
            ),
            set(
                reference(format!("{query_expr_reference}.expressionValues")),
                obj([(
                    format!(":{partition_key}"),
                    obj([(
                        partition_key_type.to_string(),
                        string(format!("$ctx.args.{partition_key}")),
                    )]),
                )]),
            ),
        ]),
    ));

    match key.sort_key.as_slice() {
        [] => {}
        [single] => expressions.push(apply_key_condition_expression(
            &single.name,
            types.attribute_type(&single.ty),
            query_expr_reference,
        )),
        _ => expressions.push(apply_composite_key_condition_expression(key, query_expr_reference)),
    }

    compound(expressions)
}

/// A sort key argument is only valid along with the partition key argument.
fn validate_key_arguments(key: &KeyFields) -> Option<Expression> {
    let partition_key = &key.field.name;
    let sort_argument = match key.sort_key.as_slice() {
        [] => return None,
        [single] => single.name.clone(),
        _ => composite_argument_name(key.sort_key_fields()),
    };

    let error = TemplateArgumentError::KeyArgumentWithoutPrevious {
        key: sort_argument.clone(),
        previous: partition_key.clone(),
    };

    Some(block(
        "Validate key arguments",
        [iff(
            raw(format!(
                "!$util.isNull($ctx.args.{sort_argument}) && $util.isNullOrBlank($ctx.args.{partition_key})"
            )),
            raw(error.to_template_call(true)),
        )],
    ))
}

fn apply_key_condition_expression(argument: &str, attribute_type: AttributeType, query_expr_reference: &str) -> Expression {
    let q = query_expr_reference;
    let value = |path: &str| format!("{{ \"{attribute_type}\": \"$ctx.args.{argument}.{path}\" }}");
    let put_sort_key_name = qref(raw(format!(
        "${q}.expressionNames.put(\"#sortKey\", \"{argument}\")"
    )));

    let mut conditions = vec![
        iff(
            raw(operator_present(argument, "beginsWith")),
            compound([
                set(
                    reference(format!("{q}.expression")),
                    raw(format!("\"${q}.expression AND begins_with(#sortKey, :sortKey)\"")),
                ),
                put_sort_key_name.clone(),
                qref(raw(format!(
                    "${q}.expressionValues.put(\":sortKey\", {})",
                    value("beginsWith")
                ))),
            ]),
        ),
        iff(
            raw(operator_present(argument, "between")),
            compound([
                set(
                    reference(format!("{q}.expression")),
                    raw(format!("\"${q}.expression AND #sortKey BETWEEN :sortKey0 AND :sortKey1\"")),
                ),
                put_sort_key_name.clone(),
                qref(raw(format!(
                    "${q}.expressionValues.put(\":sortKey0\", {})",
                    value("between[0]")
                ))),
                qref(raw(format!(
                    "${q}.expressionValues.put(\":sortKey1\", {})",
                    value("between[1]")
                ))),
            ]),
        ),
    ];

    for (operator, comparison) in SORT_KEY_COMPARISONS {
        conditions.push(iff(
            raw(operator_present(argument, operator)),
            compound([
                set(
                    reference(format!("{q}.expression")),
                    raw(format!("\"${q}.expression AND #sortKey {comparison} :sortKey\"")),
                ),
                put_sort_key_name.clone(),
                qref(raw(format!(
                    "${q}.expressionValues.put(\":sortKey\", {})",
                    value(operator)
                ))),
            ]),
        ));
    }

    block("Applying Key Condition", conditions)
}

/// Like [`apply_key_condition_expression`], with each operand condensed from the parts the caller provided.
fn apply_composite_key_condition_expression(key: &KeyFields, query_expr_reference: &str) -> Expression {
    let q = query_expr_reference;
    let names = key.sort_key_fields();
    let argument = composite_argument_name(names.iter().copied());
    let sort_key_name = composite_attribute_name(names.iter().copied());

    let condense = |path: &str, variable: &str| -> Vec<Expression> {
        let mut expressions = vec![set(reference(variable), string(""))];

        for (position, field) in names.iter().enumerate() {
            let part = format!("$ctx.args.{argument}.{path}.{field}");
            let value = if position == 0 {
                part.clone()
            } else {
                format!("${variable}#{part}")
            };

            expressions.push(iff_inline(
                raw(format!("!$util.isNull({part})")),
                set(reference(variable), string(value)),
            ));
        }

        expressions
    };

    let put_sort_key_name = qref(raw(format!(
        "${q}.expressionNames.put(\"#sortKey\", \"{sort_key_name}\")"
    )));

    let condition = |operator: &str, expression: &str, operands: &[(&str, &str, &str)]| {
        let mut statements = Vec::new();

        for &(path, variable, _) in operands {
            statements.extend(condense(path, variable));
        }

        statements.push(set(
            reference(format!("{q}.expression")),
            raw(format!("\"${q}.expression AND {expression}\"")),
        ));
        statements.push(put_sort_key_name.clone());

        for &(_, variable, placeholder) in operands {
            statements.push(qref(raw(format!(
                "${q}.expressionValues.put(\"{placeholder}\", {{ \"S\": \"${variable}\" }})"
            ))));
        }

        iff(raw(operator_present(&argument, operator)), compound(statements))
    };

    let mut conditions = vec![
        condition(
            "beginsWith",
            "begins_with(#sortKey, :sortKey)",
            &[("beginsWith", "sortKeyValue", ":sortKey")],
        ),
        condition(
            "between",
            "#sortKey BETWEEN :sortKey0 AND :sortKey1",
            &[
                ("between[0]", "sortKeyValue0", ":sortKey0"),
                ("between[1]", "sortKeyValue1", ":sortKey1"),
            ],
        ),
    ];

    for (operator, comparison) in SORT_KEY_COMPARISONS {
        conditions.push(condition(
            operator,
            &format!("#sortKey {comparison} :sortKey"),
            &[(operator, "sortKeyValue", ":sortKey")],
        ));
    }

    block("Applying Key Condition", conditions)
}

fn operator_present(argument: &str, operator: &str) -> String {
    format!("!$util.isNull($ctx.args.{argument}) && !$util.isNull($ctx.args.{argument}.{operator})")
}
