#[cfg(test)]
mod parser_tests {
    use rlox::ast_printer::AstPrinter;
    use rlox::parser::Parser;
    use rlox::reporter::Reporter;
    use rlox::scanner::scan;
    use rlox::stmt::Stmt;
    use rlox::token::Token;

    /// Parse `source` as a single expression and render it in prefix form.
    fn parse_to_string(source: &str) -> String {
        let mut reporter = Reporter::new();
        let tokens: Vec<Token<'_>> = scan(source.as_bytes(), &mut reporter);
        let mut parser = Parser::new(&tokens, &mut reporter);

        let expr = parser.parse_expression().expect("expression should parse");
        assert!(!reporter.had_error(), "unexpected parse errors");

        AstPrinter::print(&expr)
    }

    /// Parse `source` as a program, returning the statements and the
    /// diagnostics that were reported along the way.
    fn parse_program(source: &str) -> (usize, Vec<String>) {
        let mut reporter = Reporter::new();
        let tokens: Vec<Token<'_>> = scan(source.as_bytes(), &mut reporter);
        let mut parser = Parser::new(&tokens, &mut reporter);

        let statements = parser.parse();

        (statements.len(), reporter.diagnostics().to_vec())
    }

    #[test]
    fn test_parser_01_arithmetic_precedence() {
        // 1 + 2 * 3 groups as 1 + (2 * 3)
        assert_eq!(parse_to_string("1 + 2 * 3"), "(+ 1.0 (* 2.0 3.0))");
    }

    #[test]
    fn test_parser_02_comparison_binds_looser_than_term() {
        assert_eq!(
            parse_to_string("1 + 2 < 3 - 4"),
            "(< (+ 1.0 2.0) (- 3.0 4.0))"
        );
    }

    #[test]
    fn test_parser_03_equality_is_left_associative() {
        assert_eq!(
            parse_to_string("1 == 2 == 3"),
            "(== (== 1.0 2.0) 3.0)"
        );
    }

    #[test]
    fn test_parser_04_unary_binds_tightest() {
        assert_eq!(parse_to_string("-1 * 2"), "(* (- 1.0) 2.0)");
        assert_eq!(parse_to_string("!!true"), "(! (! true))");
    }

    #[test]
    fn test_parser_05_grouping_overrides_precedence() {
        assert_eq!(
            parse_to_string("(1 + 2) * 3"),
            "(* (group (+ 1.0 2.0)) 3.0)"
        );
    }

    #[test]
    fn test_parser_06_logical_or_binds_looser_than_and() {
        assert_eq!(
            parse_to_string("a or b and c"),
            "(or a (and b c))"
        );
    }

    #[test]
    fn test_parser_07_assignment_is_right_associative() {
        assert_eq!(parse_to_string("a = b = c"), "(= a (= b c))");
    }

    #[test]
    fn test_parser_08_call_and_property_chains() {
        assert_eq!(
            parse_to_string("f(1)(2).field"),
            "(. (call (call f 1.0) 2.0) field)"
        );

        assert_eq!(
            parse_to_string("a.b.c = 1"),
            "(.= (. a b) c 1.0)"
        );
    }

    #[test]
    fn test_parser_09_super_and_this() {
        assert_eq!(parse_to_string("super.cook"), "(super cook)");
        assert_eq!(parse_to_string("this.x"), "(. this x)");
    }

    #[test]
    fn test_parser_10_invalid_assignment_target() {
        let mut reporter = Reporter::new();
        let tokens: Vec<Token<'_>> = scan(b"1 + 2 = 3;", &mut reporter);
        let mut parser = Parser::new(&tokens, &mut reporter);

        parser.parse();

        assert!(reporter.had_error());
        assert!(reporter.diagnostics()[0].contains("Invalid assignment target"));
    }

    #[test]
    fn test_parser_11_recovery_surfaces_both_errors() {
        // Two broken statements; panic-mode recovery must report each one.
        let (count, diagnostics) = parse_program("var 1 = 2;\nprint;");

        assert_eq!(count, 0);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].contains("[line 1]"));
        assert!(diagnostics[0].contains("Expected variable name"));
        assert!(diagnostics[1].contains("[line 2]"));
        assert!(diagnostics[1].contains("Expected expression"));
    }

    #[test]
    fn test_parser_12_recovery_keeps_good_statements() {
        let (count, diagnostics) = parse_program("var a = 1;\nvar 2;\nprint a;");

        // The bad middle statement is dropped, its neighbors survive.
        assert_eq!(count, 2);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_parser_13_for_desugars_to_while() {
        let mut reporter = Reporter::new();
        let tokens: Vec<Token<'_>> =
            scan(b"for (var i = 0; i < 3; i = i + 1) print i;", &mut reporter);
        let mut parser = Parser::new(&tokens, &mut reporter);

        let statements = parser.parse();

        assert!(!reporter.had_error());
        assert_eq!(statements.len(), 1);

        // { var i; while (i < 3) { print i; i = i + 1; } }
        let Stmt::Block(outer) = &statements[0] else {
            panic!("expected initializer block, got {:?}", statements[0]);
        };

        assert_eq!(outer.len(), 2);
        assert!(matches!(outer[0], Stmt::Var { .. }));

        let Stmt::While { body, .. } = &outer[1] else {
            panic!("expected while loop, got {:?}", outer[1]);
        };

        let Stmt::Block(inner) = body.as_ref() else {
            panic!("expected loop body block");
        };

        assert!(matches!(inner[0], Stmt::Print(_)));
        assert!(matches!(inner[1], Stmt::Expression(_)));
    }

    #[test]
    fn test_parser_14_for_without_condition_loops_on_true() {
        let mut reporter = Reporter::new();
        let tokens: Vec<Token<'_>> = scan(b"for (;;) print 1;", &mut reporter);
        let mut parser = Parser::new(&tokens, &mut reporter);

        let statements = parser.parse();

        assert!(!reporter.had_error());

        let Stmt::While { condition, .. } = &statements[0] else {
            panic!("expected bare while, got {:?}", statements[0]);
        };

        assert_eq!(AstPrinter::print(condition), "true");
    }

    #[test]
    fn test_parser_15_class_declaration_shape() {
        let mut reporter = Reporter::new();
        let tokens: Vec<Token<'_>> = scan(
            b"class Pair < Base { first() { return 1; } second() { return 2; } }",
            &mut reporter,
        );
        let mut parser = Parser::new(&tokens, &mut reporter);

        let statements = parser.parse();

        assert!(!reporter.had_error());

        let Stmt::Class {
            name,
            superclass,
            methods,
        } = &statements[0]
        else {
            panic!("expected class declaration, got {:?}", statements[0]);
        };

        assert_eq!(name.lexeme, "Pair");
        assert_eq!(superclass.as_ref().map(|(_, t)| t.lexeme), Some("Base"));
        assert_eq!(methods.len(), 2);
    }

    #[test]
    fn test_parser_16_error_location_at_end() {
        let (_, diagnostics) = parse_program("print 1");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("at end"));
        assert!(diagnostics[0].contains("Expected ';' after value"));
    }
}
