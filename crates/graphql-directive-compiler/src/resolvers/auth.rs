use graphql_mapping_template::{compound, empty_obj, iff, method_call, not, not_equals, print_block, reference, string, to_json};

/// Denies requests no authorization rule has allowed. In sandbox mode, API key requests are let through.
pub fn generate_auth_expression_for_sandbox_mode(enabled: bool) -> String {
    let unauthorized = method_call(reference("util.unauthorized"), []);

    let expression = if enabled {
        iff(
            not_equals(
                method_call(reference("util.authType"), []),
                string("API Key Authorization"),
            ),
            unauthorized,
        )
    } else {
        unauthorized
    };

    print_block(
        &format!("Sandbox Mode {}", if enabled { "Enabled" } else { "Disabled" }),
        &compound([
            iff(not(reference("ctx.stash.get(\"hasAuth\")")), expression),
            to_json(empty_obj()),
        ]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_enabled_lets_api_key_requests_through() {
        insta::assert_snapshot!(generate_auth_expression_for_sandbox_mode(true), @r#"
        ## [Start] Sandbox Mode Enabled. **
        #if( !$ctx.stash.get("hasAuth") )
          #if( $util.authType() != "API Key Authorization" )
            $util.unauthorized()
          #end
        #end
        $util.toJson({})
        ## [End] Sandbox Mode Enabled. **
        "#);
    }

    #[test]
    fn sandbox_disabled_denies_unauthorized_requests() {
        insta::assert_snapshot!(generate_auth_expression_for_sandbox_mode(false), @r#"
        ## [Start] Sandbox Mode Disabled. **
        #if( !$ctx.stash.get("hasAuth") )
          $util.unauthorized()
        #end
        $util.toJson({})
        ## [End] Sandbox Mode Disabled. **
        "#);
    }
}
