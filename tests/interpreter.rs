#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use rlox::interpreter::Interpreter;
    use rlox::parser::Parser;
    use rlox::reporter::Reporter;
    use rlox::resolver::Resolver;
    use rlox::scanner::scan;
    use rlox::token::Token;

    /// A cloneable in-memory sink so the test can keep a handle to the bytes
    /// the interpreter writes through its boxed output channel.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `source` through the full pipeline.  Returns captured stdout and
    /// the runtime error, if one stopped the program.  Panics on static
    /// errors; use [`static_errors`] for those.
    fn run(source: &str) -> (String, Option<String>) {
        let mut reporter = Reporter::new();

        let tokens: Vec<Token<'_>> = scan(source.as_bytes(), &mut reporter);
        let statements = {
            let mut parser = Parser::new(&tokens, &mut reporter);
            parser.parse()
        };

        assert!(
            !reporter.had_error(),
            "unexpected static errors: {:?}",
            reporter.diagnostics()
        );

        let sink = SharedBuf::default();
        let mut interpreter = Interpreter::with_output(Box::new(sink.clone()));

        {
            let mut resolver = Resolver::new(&mut interpreter, &mut reporter);
            resolver.resolve(&statements);
        }

        assert!(
            !reporter.had_error(),
            "unexpected resolution errors: {:?}",
            reporter.diagnostics()
        );

        let runtime_error = interpreter.interpret(&statements).err().map(|e| e.to_string());

        drop(interpreter);

        let output = String::from_utf8(sink.0.borrow().clone()).expect("output is UTF-8");

        (output, runtime_error)
    }

    /// Run the static half of the pipeline and return the diagnostics.
    fn static_errors(source: &str) -> Vec<String> {
        let mut reporter = Reporter::new();

        let tokens: Vec<Token<'_>> = scan(source.as_bytes(), &mut reporter);
        let statements = {
            let mut parser = Parser::new(&tokens, &mut reporter);
            parser.parse()
        };

        let mut interpreter = Interpreter::new();

        {
            let mut resolver = Resolver::new(&mut interpreter, &mut reporter);
            resolver.resolve(&statements);
        }

        reporter.diagnostics().to_vec()
    }

    fn expect_output(source: &str, expected: &str) {
        let (output, runtime_error) = run(source);

        assert_eq!(runtime_error, None, "unexpected runtime error");
        assert_eq!(output, expected);
    }

    fn expect_runtime_error(source: &str, fragment: &str) -> String {
        let (output, runtime_error) = run(source);

        let message = runtime_error.expect("expected a runtime error");
        assert!(
            message.contains(fragment),
            "error {:?} should contain {:?}",
            message,
            fragment
        );

        output
    }

    // ─────────────────── expressions and printing ──────────────────

    #[test]
    fn test_arithmetic_precedence() {
        expect_output("print 1 + 2 * 3;", "7\n");
        expect_output("print (1 + 2) * 3;", "9\n");
    }

    #[test]
    fn test_number_display_drops_integral_fraction() {
        expect_output("print 2.5 + 2.5;", "5\n");
        expect_output("print 0.5 * 3;", "1.5\n");
    }

    #[test]
    fn test_string_concatenation() {
        expect_output("print \"foo\" + \"bar\";", "foobar\n");
    }

    #[test]
    fn test_plus_rejects_mixed_operands() {
        expect_runtime_error(
            "print 1 + \"one\";",
            "Operands must be two numbers or two strings",
        );
    }

    #[test]
    fn test_truthiness() {
        // Only nil and false are falsy.
        expect_output("print !nil;", "true\n");
        expect_output("print !false;", "true\n");
        expect_output("print !0;", "false\n");
        expect_output("print !\"\";", "false\n");
    }

    #[test]
    fn test_equality_is_strict() {
        expect_output("print 1 == \"1\";", "false\n");
        expect_output("print nil == nil;", "true\n");
        expect_output("print nil == false;", "false\n");
        expect_output("print \"a\" != \"b\";", "true\n");
    }

    #[test]
    fn test_logical_operators_return_operand_values() {
        expect_output("print \"hi\" or 2;", "hi\n");
        expect_output("print nil or \"yes\";", "yes\n");
        expect_output("print nil and 2;", "nil\n");
        expect_output("print false and \"x\";", "false\n");
        expect_output("print 1 and 2;", "2\n");
    }

    #[test]
    fn test_logical_short_circuit_skips_side_effects() {
        expect_output(
            "fun boom() { print \"boom\"; return true; }\n\
             false and boom();\n\
             true or boom();\n\
             print \"done\";",
            "done\n",
        );
    }

    #[test]
    fn test_division_by_zero_halts_program() {
        let output = expect_runtime_error("print 1 / 0; print 2;", "Division by zero");

        // Nothing after the failing statement runs.
        assert_eq!(output, "");
    }

    #[test]
    fn test_comparison_requires_numbers() {
        expect_runtime_error("print \"a\" < \"b\";", "Operands must be numbers");
    }

    // ─────────────────────── variables and scope ───────────────────

    #[test]
    fn test_block_scoping_and_shadowing() {
        expect_output(
            "var a = \"outer\";\n\
             {\n\
               var a = \"inner\";\n\
               print a;\n\
             }\n\
             print a;",
            "inner\nouter\n",
        );
    }

    #[test]
    fn test_assignment_is_an_expression() {
        expect_output("var a = 1; print a = 2; print a;", "2\n2\n");
    }

    #[test]
    fn test_undefined_variable_read() {
        expect_runtime_error("print ghost;", "Undefined variable 'ghost'");
    }

    #[test]
    fn test_undefined_variable_assignment() {
        expect_runtime_error("ghost = 1;", "Undefined variable 'ghost'");
    }

    #[test]
    fn test_closure_sees_declaration_time_binding() {
        // A later shadowing declaration must not change what the closure sees.
        expect_output(
            "var a = \"global\";\n\
             {\n\
               fun showA() { print a; }\n\
               showA();\n\
               var a = \"block\";\n\
               showA();\n\
             }",
            "global\nglobal\n",
        );
    }

    // ──────────────────── functions and closures ───────────────────

    #[test]
    fn test_function_return_value() {
        expect_output(
            "fun add(a, b) { return a + b; }\nprint add(1, 2);",
            "3\n",
        );
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        expect_output("fun noop() {} print noop();", "nil\n");
    }

    #[test]
    fn test_return_unwinds_nested_blocks_and_loops() {
        expect_output(
            "fun find() {\n\
               for (var i = 0; i < 10; i = i + 1) {\n\
                 if (i == 3) { return i; }\n\
               }\n\
             }\n\
             print find();",
            "3\n",
        );
    }

    #[test]
    fn test_recursion() {
        expect_output(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }\n\
             print fib(10);",
            "55\n",
        );
    }

    #[test]
    fn test_counter_closures_are_independent() {
        expect_output(
            "fun makeCounter() {\n\
               var count = 0;\n\
               fun increment() {\n\
                 count = count + 1;\n\
                 return count;\n\
               }\n\
               return increment;\n\
             }\n\
             var a = makeCounter();\n\
             var b = makeCounter();\n\
             print a();\n\
             print a();\n\
             print b();",
            "1\n2\n1\n",
        );
    }

    #[test]
    fn test_two_closures_share_one_binding() {
        expect_output(
            "var inc; var get;\n\
             {\n\
               var n = 0;\n\
               fun bump() { n = n + 1; }\n\
               fun read() { return n; }\n\
               inc = bump;\n\
               get = read;\n\
             }\n\
             inc(); inc();\n\
             print get();",
            "2\n",
        );
    }

    #[test]
    fn test_arity_mismatch() {
        expect_runtime_error(
            "fun add(a, b) { return a + b; } add(1);",
            "Expected 2 arguments but got 1",
        );
    }

    #[test]
    fn test_calling_a_non_callable() {
        expect_runtime_error("\"text\"();", "Can only call functions and classes");
    }

    #[test]
    fn test_function_display() {
        expect_output("fun f() {} print f;", "<fn f>\n");
    }

    #[test]
    fn test_clock_native() {
        expect_output("print clock() > 0;", "true\n");
        expect_runtime_error("clock(1);", "Expected 0 arguments but got 1");
    }

    // ───────────────────────── control flow ────────────────────────

    #[test]
    fn test_if_else() {
        expect_output(
            "if (1 < 2) print \"then\"; else print \"else\";",
            "then\n",
        );
        expect_output(
            "if (nil) print \"then\"; else print \"else\";",
            "else\n",
        );
    }

    #[test]
    fn test_while_loop() {
        expect_output(
            "var i = 0; while (i < 3) { print i; i = i + 1; }",
            "0\n1\n2\n",
        );
    }

    #[test]
    fn test_for_loop() {
        expect_output("for (var i = 0; i < 3; i = i + 1) print i;", "0\n1\n2\n");
    }

    // ──────────────────── classes and inheritance ──────────────────

    #[test]
    fn test_fields_and_this() {
        expect_output(
            "class Counter {\n\
               init() { this.n = 0; }\n\
               bump() { this.n = this.n + 1; return this.n; }\n\
             }\n\
             var c = Counter();\n\
             c.bump();\n\
             print c.bump();",
            "2\n",
        );
    }

    #[test]
    fn test_initializer_arguments() {
        expect_output(
            "class Point {\n\
               init(x, y) { this.x = x; this.y = y; }\n\
             }\n\
             var p = Point(3, 4);\n\
             print p.x + p.y;",
            "7\n",
        );
    }

    #[test]
    fn test_constructor_arity_comes_from_init() {
        expect_runtime_error(
            "class Point { init(x, y) {} } Point(1);",
            "Expected 2 arguments but got 1",
        );
    }

    #[test]
    fn test_early_return_in_init_yields_this() {
        expect_output(
            "class Guard {\n\
               init(ok) {\n\
                 if (!ok) return;\n\
                 this.armed = true;\n\
               }\n\
             }\n\
             print Guard(false);",
            "Guard instance\n",
        );
    }

    #[test]
    fn test_bound_method_remembers_its_instance() {
        expect_output(
            "class Greeter {\n\
               init(name) { this.name = name; }\n\
               greet() { print this.name; }\n\
             }\n\
             var m = Greeter(\"ada\").greet;\n\
             m();",
            "ada\n",
        );
    }

    #[test]
    fn test_fields_shadow_methods() {
        expect_output(
            "class Thing {\n\
               label() { return \"method\"; }\n\
             }\n\
             var t = Thing();\n\
             t.label = \"field\";\n\
             print t.label;",
            "field\n",
        );
    }

    #[test]
    fn test_undefined_property() {
        expect_runtime_error(
            "class Empty {} Empty().missing;",
            "Undefined property 'missing'",
        );
    }

    #[test]
    fn test_property_access_on_non_instance() {
        expect_runtime_error("true.field;", "Only instances have properties");
        expect_runtime_error("1.field = 2;", "Only instances have fields");
    }

    #[test]
    fn test_inherited_method() {
        expect_output(
            "class Base { speak() { print \"base\"; } }\n\
             class Derived < Base {}\n\
             Derived().speak();",
            "base\n",
        );
    }

    #[test]
    fn test_override_and_super() {
        expect_output(
            "class Base { speak() { print \"base\"; } }\n\
             class Derived < Base {\n\
               speak() {\n\
                 super.speak();\n\
                 print \"derived\";\n\
               }\n\
             }\n\
             Derived().speak();",
            "base\nderived\n",
        );
    }

    #[test]
    fn test_super_starts_above_the_lexical_class() {
        // Calling through a grand-child must not loop on the middle class:
        // super in B's method always means A, whatever this is.
        expect_output(
            "class A { name() { print \"A\"; } }\n\
             class B < A { name() { super.name(); } }\n\
             class C < B {}\n\
             C().name();",
            "A\n",
        );
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        expect_runtime_error(
            "var NotAClass = 1; class Sub < NotAClass {}",
            "Superclass must be a class",
        );
    }

    #[test]
    fn test_class_display() {
        expect_output("class Cake {} print Cake;", "Cake\n");
        expect_output("class Cake {} print Cake();", "Cake instance\n");
    }

    #[test]
    fn test_instance_equality_is_identity() {
        expect_output(
            "class Box {}\n\
             var a = Box();\n\
             var b = Box();\n\
             var c = a;\n\
             print a == b;\n\
             print a == c;",
            "false\ntrue\n",
        );
    }

    // ─────────────────────── resolver rejects ──────────────────────

    #[test]
    fn test_return_outside_function() {
        let diagnostics = static_errors("return 1;");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("Cannot return from top-level code"));
    }

    #[test]
    fn test_return_value_from_initializer() {
        let diagnostics = static_errors("class C { init() { return 1; } }");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("Cannot return a value from an initializer"));
    }

    #[test]
    fn test_this_outside_class() {
        let diagnostics = static_errors("print this;");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("Cannot use 'this' outside of a class"));
    }

    #[test]
    fn test_super_outside_class() {
        let diagnostics = static_errors("super.method();");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("Cannot use 'super' outside of a class"));
    }

    #[test]
    fn test_super_without_superclass() {
        let diagnostics = static_errors("class C { m() { super.m(); } }");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("Cannot use 'super' in a class with no superclass"));
    }

    #[test]
    fn test_class_inheriting_from_itself() {
        let diagnostics = static_errors("class Loop < Loop {}");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("A class cannot inherit from itself"));
    }

    #[test]
    fn test_self_referential_initializer() {
        let diagnostics = static_errors("{ var a = a; }");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("Cannot read local variable in its own initializer"));
    }

    #[test]
    fn test_shadowing_initializer_cannot_read_itself() {
        let diagnostics = static_errors("var a = 1; { var a = a + 1; print a; }");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("Cannot read local variable in its own initializer"));
    }

    #[test]
    fn test_duplicate_local_declaration() {
        let diagnostics = static_errors("{ var a = 1; var a = 2; }");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("Variable already declared in this scope"));
    }

    #[test]
    fn test_global_redeclaration_is_allowed() {
        // Globals may be redeclared freely; only locals are checked.
        expect_output("var a = 1; var a = 2; print a;", "2\n");
    }

    #[test]
    fn test_resolver_reports_every_error() {
        let diagnostics = static_errors("return 1;\nprint this;");

        // One bad statement must not mask the next.
        assert_eq!(diagnostics.len(), 2);
    }
}
