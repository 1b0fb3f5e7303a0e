//! Block helpers that honour strict mode.
//!
//! The engine's own `if`, `unless` and `with` treat a missing variable as
//! falsy even in strict mode. These replacements raise the same
//! missing-variable error plain expressions do, and otherwise behave like
//! the built-ins.

use handlebars::{
    BlockContext, BlockParams, Context, Handlebars, Helper, HelperDef, HelperResult, JsonTruthy,
    Output, PathAndJson, RenderContext, RenderErrorReason, Renderable,
};

/// Replace the engine's conditional and scoping helpers.
pub(crate) fn install(hb: &mut Handlebars<'_>) {
    hb.register_helper("if", Box::new(IfHelper { positive: true }));
    hb.register_helper("unless", Box::new(IfHelper { positive: false }));
    hb.register_helper("with", Box::new(WithHelper));
}

fn required_param<'a, 'rc>(
    h: &'a Helper<'rc>,
    r: &Handlebars<'_>,
    helper: &'static str,
) -> Result<&'a PathAndJson<'rc>, RenderErrorReason> {
    let param = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex(helper, 0))?;
    if r.strict_mode() && param.is_value_missing() {
        return Err(RenderErrorReason::MissingVariable(
            param.relative_path().map(|p| p.to_string()),
        ));
    }
    Ok(param)
}

#[derive(Clone, Copy)]
struct IfHelper {
    positive: bool,
}

impl HelperDef for IfHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let name = if self.positive { "if" } else { "unless" };
        let param = required_param(h, r, name)?;
        let include_zero = h
            .hash_get("includeZero")
            .and_then(|v| v.value().as_bool())
            .unwrap_or(false);

        let truthy = param.value().is_truthy(include_zero) == self.positive;
        let template = if truthy { h.template() } else { h.inverse() };
        match template {
            Some(t) => t.render(r, ctx, rc, out),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Copy)]
struct WithHelper;

impl HelperDef for WithHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let param = required_param(h, r, "with")?;

        if !param.value().is_truthy(false) {
            return match h.inverse() {
                Some(t) => t.render(r, ctx, rc, out),
                None => Ok(()),
            };
        }

        let mut block = BlockContext::new();
        match param.context_path() {
            Some(path) => block.base_path_mut().clone_from(path),
            None => block.set_base_value(param.value().clone()),
        }
        if let Some(parent) = rc.block() {
            block
                .local_variables_mut()
                .clone_from(parent.local_variables());
        }
        if let Some(name) = h.block_param() {
            let mut params = BlockParams::new();
            if param.context_path().is_some() {
                params.add_path(name, Vec::new())?;
            } else {
                params.add_value(name, param.value().clone())?;
            }
            block.set_block_params(params);
        }

        rc.push_block(block);
        let result = match h.template() {
            Some(t) => t.render(r, ctx, rc, out),
            None => Ok(()),
        };
        rc.pop_block();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strict() -> Handlebars<'static> {
        let mut hb = Handlebars::new();
        hb.set_strict_mode(true);
        install(&mut hb);
        hb
    }

    #[test]
    fn test_missing_condition_is_an_error() {
        let hb = strict();
        for template in [
            "{{#if missing}}yes{{else}}no{{/if}}",
            "{{#unless missing}}yes{{/unless}}",
            "{{#with missing}}{{name}}{{else}}none{{/with}}",
            "{{#if ok}}a{{else if missing}}b{{/if}}",
        ] {
            let err = hb.render_template(template, &json!({"ok": false})).unwrap_err();
            assert!(
                matches!(err.reason(), RenderErrorReason::MissingVariable(_)),
                "{template}: {err}"
            );
        }
    }

    #[test]
    fn test_defined_values_follow_truthiness() {
        let hb = strict();
        let data = json!({
            "flag": false,
            "zero": 0,
            "items": [],
            "user": {"name": "tux"},
        });

        let out = hb
            .render_template(
                "{{#if flag}}a{{else}}b{{/if}}|{{#unless items}}empty{{/unless}}|{{#if zero includeZero=true}}zero{{/if}}|{{#with user}}{{name}}{{/with}}|{{#with user as |u|}}{{u.name}}{{/with}}",
                &data,
            )
            .unwrap();
        assert_eq!(out, "b|empty|zero|tux|tux");
    }

    #[test]
    fn test_nested_paths_and_subexpressions() {
        let hb = strict();
        let data = json!({"model": {"table": "users"}, "n": 3});

        let out = hb
            .render_template(
                "{{#if model.table}}{{model.table}}{{/if}}{{#if (lookup model \"table\")}}!{{/if}}",
                &data,
            )
            .unwrap();
        assert_eq!(out, "users!");
        assert!(hb
            .render_template("{{#if model.missing}}x{{/if}}", &data)
            .is_err());
    }

    #[test]
    fn test_lenient_mode_keeps_falsy_behavior() {
        let mut hb = Handlebars::new();
        install(&mut hb);
        let out = hb
            .render_template("{{#if missing}}yes{{else}}no{{/if}}", &json!({}))
            .unwrap();
        assert_eq!(out, "no");
    }
}
