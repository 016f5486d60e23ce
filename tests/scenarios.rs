use jtv::{
    check_totality, parse, run, Config, DiagnosticKind, ErrorKind, Interpreter, NumericValue,
};
use std::thread;

fn int(n: i64) -> NumericValue {
    NumericValue::Int(n)
}

#[test]
fn adds_two_variables() {
    let program = parse("x = 5; y = 3; result = x + y").unwrap();
    let result = run(&program).unwrap();
    assert_eq!(result.variables["result"], int(8));
}

#[test]
fn user_value_stays_data() {
    let program = parse("user_value = 5\nsafe_result = user_value + 10").unwrap();
    assert_eq!(run(&program).unwrap().variables["safe_result"], int(15));

    for injected in &[
        "safe_result = user_value + (while 1 == 1 { })",
        "if x = 1 < 2 { }",
        "x = 1\nif x + print(x) > 0 { }",
        "y = 1 + return 2",
    ] {
        let err = parse(injected).unwrap_err();
        assert!(
            matches!(err.kind(), ErrorKind::Parse { .. }),
            "{}: {:?}",
            injected,
            err
        );
    }
}

#[test]
fn reverse_block_round_trip() {
    let program = parse("x = 5\nreverse {\n  x += 10\n  x += 5\n}").unwrap();
    let mut interpreter = Interpreter::new(&program).unwrap();
    let result = interpreter.run().unwrap();
    assert_eq!(result.variables["x"], int(20));

    interpreter
        .rollback(program.reverse_blocks()[0].id)
        .unwrap();
    assert_eq!(interpreter.get_variable("x"), Some(&int(5)));
}

#[test]
fn pure_function_with_loop_is_rejected() {
    let source = "x = 1\n@pure fn sum(n) {\n  s = 0\n  for i in 0..n { s = s + i }\n  return s\n}\ny = sum(4)";
    let program = parse(source).unwrap();

    let diagnostics = check_totality(&program);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::TotalityViolation);
    assert_eq!(diagnostics[0].line(), 4);

    let err = run(&program).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Rejected(_)));
    assert_eq!(err.diagnostics(), &diagnostics[..]);
}

#[test]
fn mutual_recursion_is_rejected() {
    let program = parse(
        "@pure fn ping(n) { return pong(n + 1) }\n@pure fn pong(n) { return ping(n + 1) }",
    )
    .unwrap();
    let diagnostics = check_totality(&program);
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics[0].message.contains("ping -> pong -> ping"));
}

#[test]
fn overflow_is_reported() {
    let program = parse("big = 9223372036854775807\nbigger = big + 1").unwrap();
    assert!(matches!(
        run(&program).unwrap_err().kind(),
        ErrorKind::Overflow(_)
    ));
}

#[test]
fn rational_sum_is_exact() {
    let program = parse("a = 1/2\nb = 1/3\nc = a + b").unwrap();
    assert_eq!(
        run(&program).unwrap().variables["c"],
        NumericValue::rational(5, 6).unwrap()
    );
}

#[test]
fn parallel_calls_to_pure_function_agree() {
    let program = parse("@pure fn mix(a, b) { return a + b + a + 1/3 }").unwrap();
    let args = [int(20), NumericValue::rational(1, 6).unwrap()];

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    let mut interpreter = Interpreter::new(&program).unwrap();
                    (0..100)
                        .map(|_| interpreter.call("mix", &args).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let expected = Some(NumericValue::rational(81, 2).unwrap());
    assert!(results.iter().flatten().all(|v| *v == expected));
}

#[test]
fn fibonacci() {
    let program = parse(
        "fn fibonacci(n: Int): Int {
            if n <= 1 {
                return n
            }

            prev = 0
            curr = 1

            for i in 2..n+1 {
                next = prev + curr
                prev = curr
                curr = next
            }

            return curr
        }

        result = fibonacci(30)
        print(result)",
    )
    .unwrap();
    let result = run(&program).unwrap();
    assert_eq!(result.variables["result"], int(832040));
    assert_eq!(result.output, vec!["832040"]);
}

#[test]
fn step_budget_stops_runaway_loop() {
    let program = parse("n = 0\nwhile n >= 0 { n = n + 1 }").unwrap();
    let err = Interpreter::new(&program)
        .unwrap()
        .with_config(Config::default().with_max_steps(1_000))
        .run()
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::BudgetExhausted(_)));
}

#[test]
fn number_kinds_mix() {
    let program = parse(
        "h = 0x10 + 1
         b = 0b101 + 0b1
         f = 1.5 + 2
         c = 3+4i + 1
         m = 1/2 + 0.5
         s = 'x + 1",
    )
    .unwrap();
    let vars = run(&program).unwrap().variables;
    assert_eq!(vars["h"], NumericValue::Hex(17));
    assert_eq!(vars["b"], NumericValue::Binary(6));
    assert_eq!(vars["f"], NumericValue::Float(3.5));
    assert_eq!(vars["c"], NumericValue::complex(4.0, 4.0));
    assert_eq!(vars["m"].to_string(), "1.0+0.0i");
    assert_eq!(vars["s"].to_string(), "'x + 1");
}

#[test]
fn runaway_recursion_hits_default_depth_limit() {
    let handle = thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| {
            let program = parse("fn down(n) { return down(n + 1) }\nx = down(0)").unwrap();
            run(&program).unwrap_err()
        })
        .unwrap();
    let err = handle.join().unwrap();
    assert!(matches!(err.kind(), ErrorKind::BudgetExhausted(_)), "{:?}", err);
}
