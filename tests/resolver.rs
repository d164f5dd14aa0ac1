#[cfg(test)]
mod resolver_tests {
    use rulox::parser::Parser;
    use rulox::resolver::{Locals, Resolver};
    use rulox::scanner::Scanner;
    use rulox::ast::Stmt;
    use rulox::token::Token;

    fn parse_source(source: &'static str) -> Vec<Stmt<'static>> {
        let tokens: Vec<Token<'static>> = Scanner::new(source.as_bytes())
            .scan_tokens()
            .expect("expected a clean scan");

        let tokens: &'static [Token<'static>] = Box::leak(tokens.into_boxed_slice());

        Parser::new(tokens).parse().expect("expected a clean parse")
    }

    fn resolve_source(source: &'static str) -> Result<Locals, String> {
        let program = parse_source(source);

        Resolver::new().resolve(&program).map_err(|e| e.to_string())
    }

    fn resolve_err(source: &'static str) -> String {
        resolve_source(source).expect_err("expected a resolve error")
    }

    #[test]
    fn globals_stay_out_of_the_side_table() {
        let locals = resolve_source("var a = 1; print a;").unwrap();
        assert!(locals.is_empty());
    }

    #[test]
    fn block_local_resolves_at_its_depth() {
        let locals = resolve_source("{ var a = 1; { print a; } }").unwrap();

        // One variable occurrence, one scope boundary crossed.
        assert_eq!(locals.len(), 1);
        assert_eq!(locals.values().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn shadowing_in_a_nested_scope_is_allowed() {
        assert!(resolve_source("{ var a = 1; { var a = 2; print a; } }").is_ok());
    }

    #[test]
    fn resolution_is_pure_across_runs() {
        let program = parse_source("{ var a = 1; fun f(x) { return x + a; } }");

        let first = Resolver::new().resolve(&program).unwrap();
        let second = Resolver::new().resolve(&program).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_declaration_in_one_scope() {
        let error = resolve_err("{ var a = 1; var a = 2; }");
        assert!(error.contains("already in scope"), "got: {error}");
    }

    #[test]
    fn duplicate_parameter_names() {
        let error = resolve_err("fun f(x, x) { return x; }");
        assert!(error.contains("already in scope"), "got: {error}");
    }

    #[test]
    fn reading_a_local_in_its_own_initializer() {
        let error = resolve_err("{ var a = a; }");
        assert!(
            error.contains("Can't read local variable in its own initializer."),
            "got: {error}"
        );
    }

    #[test]
    fn global_self_reference_is_left_to_the_runtime() {
        // No enclosing scope, so the static check does not apply.
        assert!(resolve_source("var a = a;").is_ok());
    }

    #[test]
    fn return_at_top_level() {
        let error = resolve_err("return 1;");
        assert!(
            error.contains("Can't return from top-level code."),
            "got: {error}"
        );
        assert!(error.contains("at 'return'"), "got: {error}");
    }

    #[test]
    fn returning_a_value_from_an_initializer() {
        let error = resolve_err("class A { A() { return 1; } }");
        assert!(
            error.contains("Can't return a value from an initializer."),
            "got: {error}"
        );
    }

    #[test]
    fn bare_return_in_an_initializer_is_allowed() {
        assert!(resolve_source("class A { A() { return; } }").is_ok());
    }

    #[test]
    fn this_outside_a_class() {
        let error = resolve_err("print this;");
        assert!(
            error.contains("Can't use 'this' outside of a class."),
            "got: {error}"
        );
    }

    #[test]
    fn this_inside_a_method_is_allowed() {
        assert!(resolve_source("class A { m() { return this; } }").is_ok());
    }

    #[test]
    fn super_outside_a_class() {
        let error = resolve_err("print super.m;");
        assert!(
            error.contains("Can't use 'super' outside of a class."),
            "got: {error}"
        );
    }

    #[test]
    fn super_in_a_class_without_a_superclass() {
        let error = resolve_err("class A { m() { return super.m; } }");
        assert!(
            error.contains("Can't use 'super' in a class with no superclass."),
            "got: {error}"
        );
    }

    #[test]
    fn class_inheriting_from_itself() {
        let error = resolve_err("class A < A {}");
        assert!(
            error.contains("A class can't inherit from itself."),
            "got: {error}"
        );
    }

    #[test]
    fn break_outside_a_loop() {
        let error = resolve_err("break;");
        assert!(
            error.contains("Can't use 'break' outside of a loop."),
            "got: {error}"
        );
    }

    #[test]
    fn break_cannot_cross_a_function_boundary() {
        let error = resolve_err("while (true) { fun f() { break; } }");
        assert!(
            error.contains("Can't use 'break' outside of a loop."),
            "got: {error}"
        );
    }

    #[test]
    fn break_count_deeper_than_the_enclosing_loops() {
        let error = resolve_err("while (true) { break 2; }");
        assert!(error.contains("exceeds"), "got: {error}");
    }

    #[test]
    fn nested_break_count_is_allowed() {
        assert!(resolve_source("while (true) { while (true) { break 2; } }").is_ok());
    }

    #[test]
    fn static_errors_fire_even_in_dead_code() {
        // The branch can never run; the resolver must still reject it.
        let error = resolve_err("if (false) { return 1; }");
        assert!(
            error.contains("Can't return from top-level code."),
            "got: {error}"
        );
    }
}
