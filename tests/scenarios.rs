//! End-to-end scenarios and cross-cutting invariants for the response
//! resolver, exercised through the public `Resolvable` API exactly as a
//! caller driving the gateway's fetch-response pipeline would.

use std::sync::Arc;

use graphql_response_resolver::context::{
    AuthorizationOutcome, Authorizer, Context, FetchTree, OperationType, RateLimiter, RenameRule,
    TraceOptions, Tracer,
};
use graphql_response_resolver::plan::{Field, GraphCoordinate, PlanNode};
use graphql_response_resolver::{Resolvable, SubscriptionPostProcessing};
use serde_json_bytes::ByteString;

fn bs(s: &str) -> ByteString {
    ByteString::from(s)
}

fn run(data: &[u8], plan: &PlanNode, ctx: &Context) -> (Vec<u8>, Resolvable) {
    let mut resolvable = Resolvable::new();
    resolvable.init(data, ctx.operation_type).unwrap();
    let mut out = Vec::new();
    resolvable.resolve(ctx, plan, &mut out).unwrap();
    (out, resolvable)
}

struct AllowAll;
impl Authorizer for AllowAll {
    fn has_response_extension_data(&self, _ctx: &Context) -> bool {
        false
    }
    fn render_response_extension(
        &self,
        _ctx: &Context,
        _w: &mut dyn std::io::Write,
    ) -> graphql_response_resolver::Result<()> {
        Ok(())
    }
    fn authorize_object_field(
        &self,
        _ctx: &Context,
        _datasource_id: &str,
        _flat_object_bytes: &[u8],
        _coordinate: &GraphCoordinate,
    ) -> graphql_response_resolver::Result<AuthorizationOutcome> {
        Ok(AuthorizationOutcome::Allow)
    }
}

struct DenyRealName {
    calls: std::cell::Cell<u32>,
}
impl Authorizer for DenyRealName {
    fn has_response_extension_data(&self, _ctx: &Context) -> bool {
        false
    }
    fn render_response_extension(
        &self,
        _ctx: &Context,
        _w: &mut dyn std::io::Write,
    ) -> graphql_response_resolver::Result<()> {
        Ok(())
    }
    fn authorize_object_field(
        &self,
        _ctx: &Context,
        _datasource_id: &str,
        _flat_object_bytes: &[u8],
        _coordinate: &GraphCoordinate,
    ) -> graphql_response_resolver::Result<AuthorizationOutcome> {
        self.calls.set(self.calls.get() + 1);
        Ok(AuthorizationOutcome::Deny {
            reason: Some("forbidden".to_string()),
        })
    }
}

// --- Scenario A: happy path -------------------------------------------------

#[test]
fn scenario_a_happy_path() {
    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![Field::new(
            "me",
            PlanNode::Object {
                path: vec![bs("me")],
                nullable: true,
                fields: vec![Field::new(
                    "name",
                    PlanNode::String {
                        path: vec![bs("name")],
                        nullable: false,
                        is_typename: false,
                        unescape_response_json: false,
                    },
                )],
            },
        )],
    };
    let ctx = Context::new(OperationType::Query);
    let (out, _) = run(br#"{"me":{"name":"Ada"}}"#, &plan, &ctx);
    assert_eq!(String::from_utf8(out).unwrap(), r#"{"data":{"me":{"name":"Ada"}}}"#);
}

// --- Scenario B: non-nullable leaf missing ---------------------------------

#[test]
fn scenario_b_missing_non_nullable_leaf_nulls_the_response() {
    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![Field::new(
            "me",
            PlanNode::Object {
                path: vec![bs("me")],
                nullable: false,
                fields: vec![Field::new(
                    "name",
                    PlanNode::String {
                        path: vec![bs("name")],
                        nullable: false,
                        is_typename: false,
                        unescape_response_json: false,
                    },
                )],
            },
        )],
    };
    let ctx = Context::new(OperationType::Query);
    let (out, _) = run(br#"{"me":{}}"#, &plan, &ctx);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        r#"{"errors":[{"message":"Cannot return null for non-nullable field Query.me.name.","path":["me","name"]}],"data":null}"#
    );
}

// --- Scenario C: type mismatch on a nullable leaf still bubbles -----------

#[test]
fn scenario_c_type_mismatch_on_nullable_field_still_nulls_the_response() {
    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![Field::new(
            "n",
            PlanNode::Integer {
                path: vec![bs("n")],
                nullable: true,
            },
        )],
    };
    let ctx = Context::new(OperationType::Query);
    let (out, _) = run(br#"{"n":"oops"}"#, &plan, &ctx);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        r#"{"errors":[{"message":"Int cannot represent non-integer value: \"oops\"","path":["n"]}],"data":null}"#
    );
}

// --- Scenario D: @skip -------------------------------------------------

#[test]
fn scenario_d_skip_directive_omits_field() {
    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![Field::new(
            "secret",
            PlanNode::String {
                path: vec![bs("secret")],
                nullable: true,
                is_typename: false,
                unescape_response_json: false,
            },
        )
        .with_skip_variable("s")],
    };
    let mut ctx = Context::new(OperationType::Query);
    ctx.variables
        .insert("s".to_string(), serde_json_bytes::Value::Bool(true));
    let (out, resolvable) = run(br#"{"secret":"shh"}"#, &plan, &ctx);
    assert_eq!(String::from_utf8(out).unwrap(), r#"{"data":{}}"#);
    assert_eq!(resolvable.stats().fields_resolved, 0);
}

// --- Scenario E: authorization deny on a nullable field --------------------

#[test]
fn scenario_e_authorization_deny_nulls_the_field_not_the_response() {
    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![Field::new(
            "me",
            PlanNode::Object {
                path: vec![bs("me")],
                nullable: true,
                fields: vec![Field::new(
                    "realName",
                    PlanNode::String {
                        path: vec![bs("realName")],
                        nullable: true,
                        is_typename: false,
                        unescape_response_json: false,
                    },
                )
                .with_authorization(vec![bs("ds-1")], Some(bs("User")))],
            },
        )],
    };
    let mut ctx = Context::new(OperationType::Query);
    ctx.authorizer = Some(Arc::new(DenyRealName {
        calls: std::cell::Cell::new(0),
    }));
    let (out, _) = run(br#"{"me":{"realName":"Ada Lovelace"}}"#, &plan, &ctx);
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Unauthorized to load field 'Query.me.realName', Reason: forbidden."));
    assert!(out.contains(r#""extensions":{"code":"UNAUTHORIZED_FIELD_OR_TYPE"}"#));
    assert!(out.contains(r#""data":{"me":{"realName":null}}"#));
}

// --- Scenario F: union/interface dispatch by __typename --------------------

#[test]
fn scenario_f_on_type_names_excludes_non_matching_type() {
    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![Field::new(
            "upc",
            PlanNode::String {
                path: vec![bs("upc")],
                nullable: true,
                is_typename: false,
                unescape_response_json: false,
            },
        )
        .with_on_type_names(vec![bs("Video")])],
    };
    let ctx = Context::new(OperationType::Query);
    let (out, _) = run(br#"{"__typename":"Question","upc":"123"}"#, &plan, &ctx);
    assert_eq!(String::from_utf8(out).unwrap(), r#"{"data":{}}"#);
}

#[test]
fn on_type_names_includes_field_for_any_matching_candidate() {
    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![Field::new(
            "upc",
            PlanNode::String {
                path: vec![bs("upc")],
                nullable: true,
                is_typename: false,
                unescape_response_json: false,
            },
        )
        .with_on_type_names(vec![bs("Video"), bs("Question"), bs("Article")])],
    };
    let ctx = Context::new(OperationType::Query);
    let (out, _) = run(br#"{"__typename":"Question","upc":"123"}"#, &plan, &ctx);
    assert_eq!(String::from_utf8(out).unwrap(), r#"{"data":{"upc":"123"}}"#);
}

// --- Invariants from the testable-properties section -----------------------

#[test]
fn idempotent_reset_produces_identical_output_across_reuses() {
    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![Field::new(
            "name",
            PlanNode::String {
                path: vec![bs("name")],
                nullable: false,
                is_typename: false,
                unescape_response_json: false,
            },
        )],
    };
    let ctx = Context::new(OperationType::Query);
    let mut resolvable = Resolvable::new();

    let mut first = Vec::new();
    resolvable.init(br#"{"name":"Ada"}"#, OperationType::Query).unwrap();
    resolvable.resolve(&ctx, &plan, &mut first).unwrap();

    let mut second = Vec::new();
    resolvable.init(br#"{"name":"Ada"}"#, OperationType::Query).unwrap();
    resolvable.resolve(&ctx, &plan, &mut second).unwrap();

    assert_eq!(first, second);
}

#[test]
fn at_most_one_authorize_call_per_field_per_request() {
    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![
            Field::new(
                "realName",
                PlanNode::String {
                    path: vec![bs("realName")],
                    nullable: true,
                    is_typename: false,
                    unescape_response_json: false,
                },
            )
            .with_authorization(vec![bs("ds-1")], Some(bs("User"))),
        ],
    };
    let mut ctx = Context::new(OperationType::Query);
    let authorizer = Arc::new(DenyRealName {
        calls: std::cell::Cell::new(0),
    });
    ctx.authorizer = Some(authorizer.clone());
    // Collect phase and emit phase each walk the tree once; the cache must
    // keep the authorizer itself from being invoked more than once total.
    let _ = run(br#"{"realName":"Ada Lovelace"}"#, &plan, &ctx);
    assert_eq!(authorizer.calls.get(), 1);
}

#[test]
fn null_propagation_error_path_is_a_prefix_of_the_failing_field() {
    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![Field::new(
            "me",
            PlanNode::Object {
                path: vec![bs("me")],
                nullable: false,
                fields: vec![Field::new(
                    "name",
                    PlanNode::String {
                        path: vec![bs("name")],
                        nullable: false,
                        is_typename: false,
                        unescape_response_json: false,
                    },
                )],
            },
        )],
    };
    let ctx = Context::new(OperationType::Query);
    let (out, _) = run(br#"{"me":{}}"#, &plan, &ctx);
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains(r#""data":null"#));
    assert!(out.contains(r#""path":["me","name"]"#));
}

#[test]
fn field_and_array_order_is_preserved_regardless_of_source_json_order() {
    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![
            Field::new(
                "b",
                PlanNode::Integer {
                    path: vec![bs("b")],
                    nullable: true,
                },
            ),
            Field::new(
                "a",
                PlanNode::Integer {
                    path: vec![bs("a")],
                    nullable: true,
                },
            ),
        ],
    };
    let ctx = Context::new(OperationType::Query);
    // Source JSON declares "a" before "b"; the plan asks for "b" then "a".
    let (out, _) = run(br#"{"a":1,"b":2}"#, &plan, &ctx);
    assert_eq!(String::from_utf8(out).unwrap(), r#"{"data":{"b":2,"a":1}}"#);
}

#[test]
fn array_element_order_is_preserved() {
    let plan = PlanNode::Array {
        path: vec![],
        nullable: false,
        item: Arc::new(PlanNode::Integer {
            path: vec![],
            nullable: false,
        }),
    };
    let ctx = Context::new(OperationType::Query);
    let (out, _) = run(br#"[3,1,2]"#, &plan, &ctx);
    assert_eq!(String::from_utf8(out).unwrap(), r#"{"data":[3,1,2]}"#);
}

#[test]
fn type_name_rewriting_hides_internal_type_names() {
    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![Field::new(
            "__typename",
            PlanNode::String {
                path: vec![bs("__typename")],
                nullable: false,
                is_typename: true,
                unescape_response_json: false,
            },
        )],
    };
    let mut ctx = Context::new(OperationType::Query);
    ctx.rename_type_names.push(RenameRule {
        from: bs("InternalUser"),
        to: bs("User"),
    });
    let (out, _) = run(br#"{"__typename":"InternalUser"}"#, &plan, &ctx);
    assert_eq!(String::from_utf8(out).unwrap(), r#"{"data":{"__typename":"User"}}"#);
}

// --- Extensions, including the subscription-extensions supplement ---------

struct StubTracer;
impl Tracer for StubTracer {
    fn get_trace(
        &self,
        _ctx: &Context,
        _fetch_tree: &FetchTree,
        _debug: bool,
    ) -> graphql_response_resolver::Result<Vec<u8>> {
        Ok(br#"{"durationMs":4}"#.to_vec())
    }
}

struct StubRateLimiter;
impl RateLimiter for StubRateLimiter {
    fn render_response_extension(
        &self,
        _ctx: &Context,
        w: &mut dyn std::io::Write,
    ) -> graphql_response_resolver::Result<()> {
        w.write_all(br#"{"remaining":99}"#)
            .map_err(|e| graphql_response_resolver::ResolverError::Write(e.to_string()))
    }
}

#[test]
fn subscription_extensions_are_merged_ahead_of_other_sections() {
    let post = SubscriptionPostProcessing {
        select_response_data_path: vec![bs("payload")],
        select_response_errors_path: None,
        merge_path: vec![],
        select_response_extensions_path: Some(vec![bs("ext")]),
    };
    let mut resolvable = Resolvable::new();
    resolvable
        .init_subscription(
            br#"{"payload":{"count":1},"ext":{"seq":9}}"#,
            OperationType::Subscription,
            &post,
        )
        .unwrap();

    let mut ctx = Context::new(OperationType::Subscription);
    ctx.trace = Some(TraceOptions {
        tracer: Arc::new(StubTracer),
        fetch_tree: FetchTree::default(),
        debug: false,
    });
    ctx.rate_limiter = Some(Arc::new(StubRateLimiter));
    ctx.include_rate_limit_stats = true;

    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![Field::new(
            "count",
            PlanNode::Integer {
                path: vec![bs("count")],
                nullable: true,
            },
        )],
    };
    let mut out = Vec::new();
    resolvable.resolve(&ctx, &plan, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert_eq!(
        out,
        r#"{"data":{"count":1},"extensions":{"seq":9,"rateLimit":{"remaining":99},"trace":{"durationMs":4}}}"#
    );
}

// --- Snapshot coverage of a richer, nested-array response ------------------

#[test]
fn nested_object_and_array_response_matches_snapshot() {
    let plan = PlanNode::Object {
        path: vec![],
        nullable: false,
        fields: vec![Field::new(
            "me",
            PlanNode::Object {
                path: vec![bs("me")],
                nullable: true,
                fields: vec![
                    Field::new(
                        "id",
                        PlanNode::Integer {
                            path: vec![bs("id")],
                            nullable: false,
                        },
                    ),
                    Field::new(
                        "name",
                        PlanNode::String {
                            path: vec![bs("name")],
                            nullable: false,
                            is_typename: false,
                            unescape_response_json: false,
                        },
                    ),
                    Field::new(
                        "reviews",
                        PlanNode::Array {
                            path: vec![bs("reviews")],
                            nullable: false,
                            item: Arc::new(PlanNode::Object {
                                path: vec![],
                                nullable: false,
                                fields: vec![
                                    Field::new(
                                        "product",
                                        PlanNode::Object {
                                            path: vec![bs("product")],
                                            nullable: false,
                                            fields: vec![Field::new(
                                                "upc",
                                                PlanNode::String {
                                                    path: vec![bs("upc")],
                                                    nullable: false,
                                                    is_typename: false,
                                                    unescape_response_json: false,
                                                },
                                            )],
                                        },
                                    ),
                                    Field::new(
                                        "score",
                                        PlanNode::Float {
                                            path: vec![bs("score")],
                                            nullable: false,
                                        },
                                    ),
                                ],
                            }),
                        },
                    ),
                ],
            },
        )],
    };
    let ctx = Context::new(OperationType::Query);
    let (out, _) = run(
        br#"{"me":{"id":1,"name":"Ada","reviews":[{"product":{"upc":"abc-1"},"score":4.5},{"product":{"upc":"abc-2"},"score":3.25}]}}"#,
        &plan,
        &ctx,
    );
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let pretty = serde_json::to_string_pretty(&value).unwrap();
    insta::assert_snapshot!(pretty, @r#"
    {
      "data": {
        "me": {
          "id": 1,
          "name": "Ada",
          "reviews": [
            {
              "product": {
                "upc": "abc-1"
              },
              "score": 4.5
            },
            {
              "product": {
                "upc": "abc-2"
              },
              "score": 3.25
            }
          ]
        }
      }
    }
    "#);
}

// --- A scoped pretty_assertions import, for failures worth diffing ---------

mod multi_field_failure_diff {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_non_nullable_miss_bubbles_before_later_siblings_are_walked() {
        let plan = PlanNode::Object {
            path: vec![],
            nullable: false,
            fields: vec![
                Field::new(
                    "a",
                    PlanNode::Integer {
                        path: vec![bs("a")],
                        nullable: false,
                    },
                ),
                Field::new(
                    "b",
                    PlanNode::Integer {
                        path: vec![bs("b")],
                        nullable: true,
                    },
                ),
            ],
        };
        let ctx = Context::new(OperationType::Query);
        let (out, _) = run(br#"{"b":2}"#, &plan, &ctx);
        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            r#"{"errors":[{"message":"Cannot return null for non-nullable field Query.a.","path":["a"]}],"data":null}"#
        );
    }
}
