//! DataStore sync queries: choosing the table or index a delta sync reads from.
//!
//! Every key of a model registers itself in three maps (`$QueryMap`, `$PkMap`, `$SkMap`). At request time the
//! filter of a sync query is matched against them to turn the scan into a query on the best fitting key.

use graphql_mapping_template::{
    and, block, boolean, compound, empty_obj, for_each, if_else, iff, iff_inline, int, list, method_call, not,
    not_equals, obj, print, qref, raw, reference, set, string, to_json, Expression, RESOLVER_VERSION_ID,
};
use indexmap::IndexMap;
use itertools::Itertools;

use super::{
    index::add_index_to_resolver_slot,
    key_snippets::{DEFAULT_PAGE_LIMIT, MODEL_QUERY_EXPRESSION},
    pipeline::{Resolver, ResolverKey, ResolverRegistry},
};
use crate::key_schema::KeyFields;

/// Name the primary key of a model registers under.
pub const PRIMARY_KEY_SYNC_NAME: &str = "dbTable";

const SORT_KEY_OPERATORS: [(&str, &str); 5] = [("eq", "="), ("lt", "<"), ("le", "<="), ("gt", ">"), ("ge", ">=")];

/// Sync map registrations per sync resolver, in the order keys were processed.
#[derive(Debug, Clone, Default)]
pub struct SyncQueryAccumulator {
    snippets: IndexMap<ResolverKey, Vec<String>>,
}

impl SyncQueryAccumulator {
    /// Registers a key of the model behind the sync resolver.
    pub fn add(&mut self, resolver: ResolverKey, name: &str, key: &KeyFields) {
        tracing::trace!("registering key {name} for sync resolver {resolver}");
        self.snippets
            .entry(resolver)
            .or_default()
            .push(print(&set_sync_query_map_snippet(name, key)));
    }

    /// Adds the complete sync query selection to the pre-auth slot of every sync resolver with registered keys.
    pub fn apply(self, resolvers: &mut ResolverRegistry) {
        for (key, snippets) in self.snippets {
            match resolvers.get_mut(&key) {
                Some(resolver) => construct_sync_vtl(&snippets.join("\n"), resolver),
                None => tracing::debug!("no sync resolver {key} to add the sync query to"),
            }
        }
    }
}

/// Maps the key fields of `name` so a sync query can find it.
pub fn set_sync_query_map_snippet(name: &str, key: &KeyFields) -> Expression {
    let key_names = key.key_names();
    let sort_key_fields = key.sort_key_fields();

    block(
        "Set query expression for @key",
        [
            raw(format!("$util.qr($QueryMap.put('{}' , '{name}'))", key_names.iter().join("+"))),
            raw(format!("$util.qr($PkMap.put('{}' , '{name}'))", key.field.name)),
            qref(method_call(
                reference("SkMap.put"),
                [string(name), list(sort_key_fields.into_iter().map(string))],
            )),
        ],
    )
}

/// Surrounds the accumulated map registrations with the sync query selection, in the pre-auth slot.
pub fn construct_sync_vtl(registrations: &str, resolver: &mut Resolver) {
    let checks = [
        print(&generate_sync_resolver_init()),
        registrations.to_string(),
        print(&set_sync_query_filter_snippet()),
        print(&set_sync_key_expression_for_hash_key()),
        print(&set_sync_key_expression_for_range_key()),
        print(&make_sync_query_resolver()),
    ];

    add_index_to_resolver_slot(resolver, &checks, true);
}

fn generate_sync_resolver_init() -> Expression {
    block(
        "Set map initialization for @key",
        [
            set(reference("index"), string("")),
            set(reference("scan"), boolean(true)),
            set(reference("filterMap"), empty_obj()),
            set(reference("QueryMap"), empty_obj()),
            set(reference("PkMap"), empty_obj()),
            set(reference("SkMap"), empty_obj()),
            set(reference("filterArgsMap"), empty_obj()),
            iff(reference("ctx.stash.QueryRequest"), raw("#return")),
            set(reference("queryRequestVariables"), empty_obj()),
        ],
    )
}

/// Within the delta table retention, the sync reads the delta table and needs no key.
fn generate_delta_table_ttl_check() -> Expression {
    compound([
        set(reference("isLastSyncInDeltaTTLWindow"), boolean(false)),
        set(
            reference("minLastSync"),
            raw("$util.time.nowEpochMilliSeconds() - $ctx.stash.deltaSyncTableTtl * 60 * 1000"),
        ),
        iff(
            and([
                not(method_call(reference("util.isNull"), [reference("ctx.args.lastSync")])),
                not_equals(reference("ctx.args.lastSync"), int(0)),
                raw("$minLastSync <= $ctx.args.lastSync"),
            ]),
            set(reference("isLastSyncInDeltaTTLWindow"), boolean(true)),
        ),
    ])
}

fn set_sync_query_filter_snippet() -> Expression {
    let match_key = compound([
        set(reference("filterArgsMap"), reference("ctx.args.filter.get(\"and\")")),
        generate_delta_table_ttl_check(),
        if_else(
            raw("!$util.isNullOrEmpty($filterArgsMap) && !$isLastSyncInDeltaTTLWindow"),
            compound([
                set(reference("json"), raw("$filterArgsMap")),
                for_each(
                    reference("item"),
                    reference("json"),
                    [
                        set(reference("ind"), raw("$foreach.index")),
                        for_each(
                            reference("entry"),
                            reference("item.entrySet()"),
                            [
                                iff(
                                    raw("$ind == 0 && !$util.isNullOrEmpty($entry.value.eq) && !$util.isNullOrEmpty($PkMap.get($entry.key))"),
                                    compound([
                                        set(reference("pk"), reference("entry.key")),
                                        set(reference("scan"), boolean(false)),
                                        raw("$util.qr($ctx.args.put($pk,$entry.value.eq))"),
                                        set(reference("index"), reference("PkMap.get($pk)")),
                                    ]),
                                ),
                                iff(
                                    raw("$ind == 1 && !$util.isNullOrEmpty($pk) && !$util.isNullOrEmpty($QueryMap.get(\"${pk}+$entry.key\"))"),
                                    compound([
                                        set(reference("sk"), reference("entry.key")),
                                        raw("$util.qr($ctx.args.put($sk,$entry.value))"),
                                        set(reference("index"), reference("QueryMap.get(\"${pk}+$sk\")")),
                                    ]),
                                ),
                                iff(
                                    raw("$ind > 0 && (!$util.isNullOrEmpty($pk) || !$util.isNullOrEmpty($sk))"),
                                    qref(raw("$filterMap.put($entry.key,$entry.value)")),
                                ),
                            ],
                        ),
                    ],
                ),
            ]),
            set(reference("filterMap"), raw("$ctx.args.filter")),
        ),
    ]);

    block("Set query expression for @key", [compound([match_key])])
}

fn set_sync_key_expression_for_hash_key() -> Expression {
    block(
        "Set Primary Key initialization @key",
        [
            set(reference(MODEL_QUERY_EXPRESSION), empty_obj()),
            iff(
                raw("!$util.isNull($pk)"),
                compound([
                    set(
                        reference(format!("{MODEL_QUERY_EXPRESSION}.expression")),
                        string("#pk = :pk"),
                    ),
                    set(
                        reference(format!("{MODEL_QUERY_EXPRESSION}.expressionNames")),
                        obj([("#pk", string("$pk"))]),
                    ),
                    set(
                        reference(format!("{MODEL_QUERY_EXPRESSION}.expressionValues")),
                        obj([(
                            ":pk",
                            reference("util.parseJson($util.dynamodb.toDynamoDBJson($ctx.args.get($pk)))"),
                        )]),
                    ),
                ]),
            ),
        ],
    )
}

fn set_sync_key_expression_for_range_key() -> Expression {
    let q = MODEL_QUERY_EXPRESSION;
    let sort_key_value = |path: &str| format!("$util.parseJson($util.dynamodb.toDynamoDBJson($ctx.args.get($sk).{path}))");
    let put_sort_key_name = qref(raw(format!("${q}.expressionNames.put(\"#sortKey\", $sk)")));

    let mut conditions = vec![
        iff(
            raw("!$util.isNull($ctx.args.get($sk)) && !$util.isNull($ctx.args.get($sk).beginsWith)"),
            compound([
                set(
                    reference(format!("{q}.expression")),
                    raw(format!("\"${q}.expression AND begins_with(#sortKey, :sortKey)\"")),
                ),
                put_sort_key_name.clone(),
                qref(raw(format!(
                    "${q}.expressionValues.put(\":sortKey\", {})",
                    sort_key_value("beginsWith")
                ))),
            ]),
        ),
        iff(
            raw("!$util.isNull($ctx.args.get($sk)) && !$util.isNull($ctx.args.get($sk).between)"),
            compound([
                set(
                    reference(format!("{q}.expression")),
                    raw(format!("\"${q}.expression AND #sortKey BETWEEN :sortKey0 AND :sortKey1\"")),
                ),
                put_sort_key_name.clone(),
                qref(raw(format!(
                    "${q}.expressionValues.put(\":sortKey0\", {})",
                    sort_key_value("between[0]")
                ))),
                qref(raw(format!(
                    "${q}.expressionValues.put(\":sortKey1\", {})",
                    sort_key_value("between[1]")
                ))),
            ]),
        ),
    ];

    for (operator, comparison) in SORT_KEY_OPERATORS {
        conditions.push(iff(
            raw(format!(
                "!$util.isNull($ctx.args.get($sk)) && !$util.isNull($ctx.args.get($sk).{operator})"
            )),
            compound([
                set(
                    reference(format!("{q}.expression")),
                    raw(format!("\"${q}.expression AND #sortKey {comparison} :sortKey\"")),
                ),
                put_sort_key_name.clone(),
                qref(raw(format!(
                    "${q}.expressionValues.put(\":sortKey\", {})",
                    sort_key_value(operator)
                ))),
            ]),
        ));
    }

    block("Applying Key Condition", conditions)
}

fn make_sync_query_resolver() -> Expression {
    let request = "QueryRequest";

    block(
        " Set query expression for @key",
        [
            iff(
                raw("!$scan"),
                compound([
                    set(
                        reference("limit"),
                        reference(format!("util.defaultIfNull($context.args.limit, {DEFAULT_PAGE_LIMIT})")),
                    ),
                    set(reference(format!("ctx.stash.{request}Variables")), empty_obj()),
                    set(
                        reference(format!("ctx.stash.{request}")),
                        obj([
                            ("version", string(RESOLVER_VERSION_ID)),
                            ("operation", string("Sync")),
                            ("limit", reference("limit")),
                            ("lastSync", reference("util.defaultIfNull($ctx.args.lastSync, null)")),
                            ("query", reference(MODEL_QUERY_EXPRESSION)),
                        ]),
                    ),
                    if_else(
                        raw("!$util.isNull($ctx.args.sortDirection) && $ctx.args.sortDirection == \"DESC\""),
                        set(reference(format!("ctx.stash.{request}.scanIndexForward")), boolean(false)),
                        set(reference(format!("ctx.stash.{request}.scanIndexForward")), boolean(true)),
                    ),
                    iff_inline(
                        reference("context.args.nextToken"),
                        set(
                            reference(format!("ctx.stash.{request}.nextToken")),
                            reference("context.args.nextToken"),
                        ),
                    ),
                    iff(
                        and([
                            raw("!$util.isNullOrEmpty($filterMap)"),
                            not_equals(to_json(reference("filterMap")), to_json(empty_obj())),
                        ]),
                        set(
                            reference(format!("ctx.stash.{request}.filter")),
                            reference("util.parseJson($util.transform.toDynamoDBFilterExpression($filterMap))"),
                        ),
                    ),
                    iff(
                        raw(format!("$index != \"{PRIMARY_KEY_SYNC_NAME}\"")),
                        set(reference(format!("ctx.stash.{request}.index")), reference("index")),
                    ),
                ]),
            ),
            raw("$util.toJson({})"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use async_graphql_parser::types::{BaseType, Type};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{key_schema::KeyField, resolvers::SlotName};

    fn key(field: &str, sort_key: &[&str]) -> KeyFields {
        let key_field = |name: &str| KeyField {
            name: name.to_string(),
            ty: Type {
                base: BaseType::Named(async_graphql_value::Name::new("String")),
                nullable: false,
            },
        };

        KeyFields {
            field: key_field(field),
            sort_key: sort_key.iter().map(|name| key_field(name)).collect(),
        }
    }

    #[test]
    fn query_map_registration() {
        assert_eq!(
            print(&set_sync_query_map_snippet("byAuthor", &key("author", &["status", "date"]))),
            indoc! {r#"
                ## [Start] Set query expression for @key. **
                $util.qr($QueryMap.put('author+status+date' , 'byAuthor'))
                $util.qr($PkMap.put('author' , 'byAuthor'))
                $util.qr($SkMap.put("byAuthor", ["status", "date"]))
                ## [End] Set query expression for @key. **"#}
        );
    }

    #[test]
    fn registrations_land_in_one_pre_auth_template_per_sync_resolver() {
        let sync = ResolverKey::new("Query", "syncPosts");
        let mut resolvers = ResolverRegistry::new();
        resolvers.add(Resolver::new(sync.clone(), None, "request", "response", "Post")).unwrap();

        let mut accumulator = SyncQueryAccumulator::default();
        accumulator.add(sync.clone(), PRIMARY_KEY_SYNC_NAME, &key("id", &[]));
        accumulator.add(sync.clone(), "byAuthor", &key("author", &["date"]));
        accumulator.add(ResolverKey::new("Query", "syncComments"), PRIMARY_KEY_SYNC_NAME, &key("id", &[]));
        accumulator.apply(&mut resolvers);

        let resolver = resolvers.get(&sync).unwrap();
        let [template] = resolver.slot(SlotName::PreAuth) else {
            panic!("expected a single pre-auth template");
        };
        let request = template.request.as_deref().unwrap();

        assert!(request.starts_with("## [Start] Set map initialization for @key. **"));
        assert!(request.ends_with("$util.toJson({})\n## [End]  Set query expression for @key. **\n"));

        let table = request.find("$util.qr($QueryMap.put('id' , 'dbTable'))").unwrap();
        let index = request.find("$util.qr($QueryMap.put('author+date' , 'byAuthor'))").unwrap();
        let filter = request.find("#set( $filterArgsMap = $ctx.args.filter.get(\"and\") )").unwrap();
        assert!(table < index && index < filter);

        assert!(request.contains("#if( $index != \"dbTable\" )"));
        assert!(request.contains("AND #sortKey BETWEEN :sortKey0 AND :sortKey1"));
        assert!(resolvers.get(&ResolverKey::new("Query", "syncComments")).is_none());
    }
}
