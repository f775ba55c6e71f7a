use super::*;
use crate::language::parser::parse;

type Lines = Rc<RefCell<Vec<String>>>;

fn evaluator() -> (Evaluator, Lines) {
    let lines: Lines = Rc::new(RefCell::new(Vec::new()));
    let captured = lines.clone();
    let mut evaluator = Evaluator::new(move |line| captured.borrow_mut().push(line.to_string()));
    evaluator.set_warnings(false);
    (evaluator, lines)
}

fn try_run(source: &str) -> (RuntimeResult<()>, Evaluator, Lines) {
    let (mut evaluator, lines) = evaluator();
    let program = parse(&tokenize(source)).expect("program should parse");
    let result = evaluator.evaluate(&program);
    (result, evaluator, lines)
}

fn run(source: &str) -> (Evaluator, Vec<String>) {
    let (result, evaluator, lines) = try_run(source);
    if let Err(err) = result {
        panic!("evaluation failed: {}", err);
    }
    let output = lines.borrow().clone();
    (evaluator, output)
}

fn output(source: &str) -> Vec<String> {
    run(source).1
}

fn run_error(source: &str) -> RuntimeError {
    let (result, _, _) = try_run(source);
    result.expect_err("evaluation should fail")
}

fn eval(evaluator: &mut Evaluator, text: &str) -> Value {
    evaluator
        .eval_expression(text)
        .unwrap_or_else(|err| panic!("`{}` failed: {}", text, err))
}

#[test]
fn add_numbers_function() {
    let (mut evaluator, _) = run("Function AddNumbers(a, b)\n AddNumbers = a + b\nEnd Function\n");
    let result = evaluator.call_procedure("AddNumbers", vec![3.0.into(), 4.0.into()]);
    assert_eq!(result.ok(), Some(Value::Number(7.0)));
    let result = evaluator.call_procedure("addnumbers", vec![(-5.0).into(), 10.0.into()]);
    assert_eq!(result.ok(), Some(Value::Number(5.0)));
}

#[test]
fn debug_print_inside_loop() {
    let source = r#"
Function AddNumbers(a, b)
    AddNumbers = a + b
End Function

Sub MainLoop()
    Dim i
    For i = 1 To 3
        Debug.Print AddNumbers(i, 10)
    Next i
End Sub

MainLoop
"#;
    assert_eq!(output(source), vec!["11", "12", "13"]);
}

#[test]
fn unset_names_read_as_zero() {
    let (evaluator, lines) = run("Debug.Print neverSet + 1\nDebug.Print IsEmpty(alsoUnset)");
    assert_eq!(lines, vec!["1", "True"]);
    assert_eq!(evaluator.global("NEVERSET"), Some(Value::Number(0.0)));
}

#[test]
fn dim_declares_empty() {
    assert_eq!(
        output("Dim a, b\nDebug.Print IsEmpty(a), a = 0, b & \"|\""),
        vec!["True False |"]
    );
}

#[test]
fn byref_copies_back_and_byval_does_not() {
    let source = r#"
Sub Bump(ByRef a, ByVal b, c)
    a = a + 1: b = b + 1: c = c + 1
End Sub
x = 1: y = 1: z = 1
Bump x, y, z
Debug.Print x, y, z
Bump (x + 0), y, z
Debug.Print x, y, z
"#;
    assert_eq!(output(source), vec!["2 1 2", "2 1 3"]);
}

#[test]
fn arrays_are_shared_regardless_of_passing_mode() {
    let source = r#"
Sub Fill(ByVal target, value)
    target(0) = value
End Sub
Dim data(2)
Fill data, "set"
Debug.Print data(0)
"#;
    assert_eq!(output(source), vec!["set"]);
}

#[test]
fn dim_in_a_procedure_rebinds_an_existing_global() {
    let source = r#"
x = 1
Sub Shadow()
    Dim x
    x = 99
    temp = 5
End Sub
Shadow
Debug.Print x
"#;
    let (evaluator, lines) = run(source);
    assert_eq!(lines, vec!["99"]);
    assert_eq!(evaluator.global("temp"), None);

    let source = r#"
total = 5
Sub Reset()
    Dim total
End Sub
Reset
Debug.Print IsEmpty(total), total
"#;
    assert_eq!(output(source), vec!["True "]);
}

#[test]
fn const_in_a_procedure_rebinds_an_existing_global() {
    let source = r#"
limit = 1
Sub Configure()
    Const limit = 10
    Const local = 2
End Sub
Configure
Debug.Print limit
"#;
    let (evaluator, lines) = run(source);
    assert_eq!(lines, vec!["10"]);
    assert_eq!(evaluator.global("local"), None);
}

#[test]
fn procedures_write_through_to_globals() {
    let source = r#"
Dim counter
Sub Tick()
    counter = counter + 1
End Sub
Tick
Tick
"#;
    let (evaluator, _) = run(source);
    assert_eq!(evaluator.global("counter"), Some(Value::Number(2.0)));
}

#[test]
fn callee_does_not_see_caller_locals() {
    let source = r#"
Sub Outer()
    Dim secret
    secret = 42
    Inner
End Sub
Sub Inner()
    Debug.Print secret
End Sub
Outer
"#;
    assert_eq!(output(source), vec!["0"]);
}

#[test]
fn exit_for_only_leaves_inner_loop() {
    let source = r#"
For i = 1 To 3
    For j = 1 To 3
        If j = 2 Then Exit For
        Debug.Print i & "-" & j
    Next j
Next i
Debug.Print "done"
"#;
    assert_eq!(output(source), vec!["1-1", "2-1", "3-1", "done"]);
}

#[test]
fn exit_function_unwinds_through_loop() {
    let source = r#"
Function FindFirstOver(limit)
    Dim i
    FindFirstOver = -1
    For i = 1 To 10
        If i * i > limit Then
            FindFirstOver = i
            Exit Function
        End If
        Debug.Print i
    Next i
    Debug.Print "unreachable"
End Function
"#;
    let (mut evaluator, lines) = evaluator();
    let program = parse(&tokenize(source)).expect("parse");
    evaluator.evaluate(&program).expect("evaluate");
    let result = evaluator.call_procedure("FindFirstOver", vec![10.0.into()]);
    assert_eq!(result.ok(), Some(Value::Number(4.0)));
    assert_eq!(*lines.borrow(), vec!["1", "2", "3"]);
}

#[test]
fn exit_sub_stops_the_sub() {
    let source = r#"
Sub Early(flag)
    Debug.Print "start"
    If flag Then Exit Sub
    Debug.Print "end"
End Sub
Early True
Early False
"#;
    assert_eq!(output(source), vec!["start", "start", "end"]);
}

#[test]
fn do_while_with_exit_do() {
    let source = r#"
n = 0
Do While n < 100
    n = n + 1
    If n = 3 Then Exit Do
Loop
Debug.Print n
Do While False
    Debug.Print "never"
Loop
"#;
    assert_eq!(output(source), vec!["3"]);
}

#[test]
fn for_loop_counts_down_and_leaves_final_value() {
    let (evaluator, lines) = run("For i = 5 To 1 Step -2: Debug.Print i: Next\nFor k = 1 To 3\nNext");
    assert_eq!(lines, vec!["5", "3", "1"]);
    assert_eq!(evaluator.global("i"), Some(Value::Number(-1.0)));
    assert_eq!(evaluator.global("k"), Some(Value::Number(4.0)));
}

#[test]
fn for_loop_bounds_are_evaluated_once() {
    let source = r#"
limit = 3
For i = 1 To limit
    limit = 10
    count = count + 1
Next
Debug.Print count
"#;
    assert_eq!(output(source), vec!["3"]);
}

#[test]
fn unmatched_exit_at_top_level() {
    let err = run_error("x = 1\nExit For");
    assert!(matches!(
        err,
        RuntimeError::UnmatchedExit {
            target: ExitTarget::For
        }
    ));
}

#[test]
fn exit_for_in_a_sub_stops_the_callers_loop() {
    let source = r#"
Sub Breaker()
    Exit For
End Sub
For i = 1 To 3
    Debug.Print i
    Breaker
Next
Debug.Print "after"
"#;
    assert_eq!(output(source), vec!["1", "after"]);
}

#[test]
fn exit_from_a_callee_skips_the_rest_of_the_statement() {
    let source = r#"
Function Halt()
    Halt = 1
    Exit Do
End Function
n = 0
Do While n < 5
    n = n + Halt()
    Debug.Print "unreached"
Loop
Debug.Print n
"#;
    assert_eq!(output(source), vec!["0"]);
}

#[test]
fn byref_copy_back_happens_before_an_exit_propagates() {
    let source = r#"
Sub Bump(n)
    n = n + 1
    Exit Do
End Sub
k = 0
Do While k < 5
    Bump k
Loop
Debug.Print k
"#;
    assert_eq!(output(source), vec!["1"]);
}

#[test]
fn exits_nobody_consumes_are_errors() {
    let source = r#"
Sub Breaker()
    Exit For
End Sub
Breaker
"#;
    assert!(matches!(
        run_error(source),
        RuntimeError::UnmatchedExit {
            target: ExitTarget::For
        }
    ));
    let err = run_error("Function F()\n Exit Sub\nEnd Function\nx = F()");
    assert!(matches!(
        err,
        RuntimeError::UnmatchedExit {
            target: ExitTarget::Sub
        }
    ));
}

#[test]
fn operators() {
    let (mut evaluator, _) = evaluator();
    let cases: [(&str, Value); 12] = [
        ("1 + 2 * 3", Value::Number(7.0)),
        ("-2 ^ 2", Value::Number(-4.0)),
        ("7 \\ 2", Value::Number(3.0)),
        ("-7 \\ 2", Value::Number(-4.0)),
        ("7 Mod 3", Value::Number(1.0)),
        ("5 / 2", Value::Number(2.5)),
        ("2 ^ 10", Value::Number(1024.0)),
        ("\"a\" & 1 & True", Value::from("a1True")),
        ("\"a\" + \"b\"", Value::from("ab")),
        ("1 = \"1\"", Value::Boolean(false)),
        ("\"b\" > \"a\"", Value::Boolean(true)),
        ("Not 0", Value::Boolean(true)),
    ];
    for (text, expected) in cases {
        assert_eq!(eval(&mut evaluator, text), expected, "{}", text);
    }
    assert_eq!(eval(&mut evaluator, "1 / 0").to_string(), "Infinity");
    assert!(matches!(
        evaluator.eval_expression("1 \\ 0"),
        Err(RuntimeError::DivisionByZero)
    ));
    assert!(matches!(
        evaluator.eval_expression("1 Mod 0"),
        Err(RuntimeError::DivisionByZero)
    ));
}

#[test]
fn and_or_evaluate_both_sides() {
    let source = r#"
Dim calls
Function Touch(v)
    calls = calls + 1
    Touch = v
End Function
r = Touch(False) And Touch(True)
s = Touch(True) Or Touch(False)
t = 0 Or "fallback"
"#;
    let (evaluator, _) = run(source);
    assert_eq!(evaluator.global("calls"), Some(Value::Number(4.0)));
    assert_eq!(evaluator.global("r"), Some(Value::Boolean(false)));
    assert_eq!(evaluator.global("s"), Some(Value::Boolean(true)));
    assert_eq!(evaluator.global("t"), Some(Value::from("fallback")));
}

#[test]
fn arrays_dim_redim_erase() {
    let source = r#"
Dim arr(3)
arr(1) = 10
Debug.Print UBound(arr), arr(1), IsEmpty(arr(0)), IsEmpty(arr(9))
ReDim arr(5)
Debug.Print UBound(arr), IsEmpty(arr(1))
Erase arr
Debug.Print UBound(arr)
"#;
    assert_eq!(output(source), vec!["3 10 True True", "5 True", "-1"]);
}

#[test]
fn multi_dimensional_arrays() {
    let source = r#"
Dim m(2, 3)
m(1, 2) = "x"
Debug.Print UBound(m), UBound(m, 2), m(1, 2)
Dim grid(2)
grid(1, 4) = 7
Debug.Print grid(1, 4), UBound(grid, 2)
"#;
    assert_eq!(output(source), vec!["2 3 x", "7 4"]);
}

#[test]
fn negative_index_write_is_an_error() {
    let err = run_error("Dim a(2)\na(-1) = 5");
    assert!(matches!(err, RuntimeError::IndexOutOfRange { .. }));
}

#[test]
fn oversized_arrays_are_errors() {
    for source in [
        "Dim a(100000000000)",
        "Dim grid(100000, 100000)",
        "ReDim a(100000000000)",
        "Dim a(2)\na(4000000000) = 1",
        "Dim a(2)\na(4000000000, 0) = 1",
    ] {
        assert!(
            matches!(run_error(source), RuntimeError::IndexOutOfRange { .. }),
            "{}",
            source
        );
    }
}

#[test]
fn dictionary_operations() {
    let source = r#"
Set d = CreateObject("Scripting.Dictionary")
d.Add "a", 1
d("b") = 2
d.Add "a", 3
Debug.Print d.Count, d("a"), d.Exists("b"), d.Exists("z")
keys = d.Keys
items = d.Items()
Debug.Print keys(0) & keys(1), items(1), UBound(keys)
d.Item("c") = 9
d.Remove "a"
Debug.Print d.Count, d.Item("c")
"#;
    assert_eq!(
        output(source),
        vec!["2 3 True False", "ab 2 1", "2 9"]
    );
}

#[test]
fn collection_operations() {
    let source = r#"
Dim c As New Collection
c.Add "x"
c.Add "y"
Debug.Print c.Count, c.Item(2), c(1), IsEmpty(c(5))
Set other = New Collection
other.Add c
Debug.Print other(1).Count
"#;
    assert_eq!(output(source), vec!["2 y x True", "2"]);
}

#[test]
fn member_errors() {
    assert!(matches!(
        run_error("x = 5\ny = x.Foo"),
        RuntimeError::UnknownMember { .. }
    ));
    assert!(matches!(
        run_error("Set d = CreateObject(\"Scripting.Dictionary\")\nd.Bogus 1"),
        RuntimeError::UnknownMember { .. }
    ));
    assert!(matches!(
        run_error("Set d = CreateObject(\"Scripting.Dictionary\")\nd.Name = 5"),
        RuntimeError::InvalidAssignment { .. }
    ));
    assert!(matches!(
        run_error("Set c = New Collection\nc.Count = 3"),
        RuntimeError::InvalidAssignment { .. }
    ));
}

#[test]
fn call_and_index_errors() {
    assert!(matches!(
        run_error("Missing 1, 2"),
        RuntimeError::UnknownProcedure { .. }
    ));
    assert!(matches!(
        run_error("n = 3\nDebug.Print n(1)"),
        RuntimeError::NotIndexable {
            type_name: "Number",
            ..
        }
    ));
    assert!(matches!(
        run_error("Set x = CreateObject(\"Excel.Application\")"),
        RuntimeError::UnsupportedObject { .. }
    ));
    let (mut evaluator, _) = evaluator();
    assert!(matches!(
        evaluator.call_procedure("Nope", vec![]),
        Err(RuntimeError::UnknownProcedure { .. })
    ));
}

#[test]
fn procedures_shadow_variables_of_the_same_name() {
    let source = r#"
Function Twice(n)
    Twice = n * 2
End Function
Twice = 100
Debug.Print Twice(4)
"#;
    assert_eq!(output(source), vec!["8"]);
}

#[test]
fn recursion_and_return_slot() {
    let source = r#"
Function Fact(n)
    If n <= 1 Then
        Fact = 1
    Else
        Fact = n * Fact(n - 1)
    End If
End Function
Function Nothing_Set()
End Function
Sub Work()
End Sub
"#;
    let (mut evaluator, _) = run(source);
    assert_eq!(
        evaluator.call_procedure("Fact", vec![5.0.into()]).ok(),
        Some(Value::Number(120.0))
    );
    assert_eq!(
        evaluator.call_procedure("Nothing_Set", vec![]).ok(),
        Some(Value::Empty)
    );
    assert_eq!(evaluator.call_procedure("Work", vec![]).ok(), Some(Value::Empty));
}

#[test]
fn missing_arguments_bind_to_defaults_or_empty() {
    let source = r#"
Function Describe(a, Optional b = 5, Optional c)
    Describe = a & ":" & b & ":" & IsEmpty(c)
End Function
"#;
    let (mut evaluator, _) = run(source);
    assert_eq!(
        evaluator.call_procedure("Describe", vec![1.0.into()]).ok(),
        Some(Value::from("1:5:True"))
    );
    assert_eq!(
        evaluator
            .call_procedure("Describe", vec![1.0.into(), 2.0.into(), 3.0.into()])
            .ok(),
        Some(Value::from("1:2:False"))
    );
}

#[test]
fn procedures_are_callable_before_declaration() {
    let source = r#"
x = GetFive
Debug.Print x + Double(1)
Function GetFive()
    GetFive = 5
End Function
Function Double(n)
    Double = n * 2
End Function
"#;
    assert_eq!(output(source), vec!["7"]);
}

#[test]
fn eval_expression_sees_globals() {
    let (mut evaluator, _) = run("total = 4\nConst LABEL = \"sum\"");
    assert_eq!(eval(&mut evaluator, "total * 2"), Value::Number(8.0));
    assert_eq!(eval(&mut evaluator, "UCase(label)"), Value::from("SUM"));
    assert!(matches!(
        evaluator.eval_expression("total +"),
        Err(RuntimeError::Syntax(_))
    ));
}

#[test]
fn option_base_sets_lbound() {
    assert_eq!(
        output("Dim a(3)\nDebug.Print LBound(a)\nOption Base 1\nDebug.Print LBound(a)"),
        vec!["0", "1"]
    );
}

#[test]
fn on_error_is_inert() {
    let source = r#"
On Error Resume Next
Set x = CreateObject("Nope.Object")
Debug.Print "after"
"#;
    assert!(matches!(
        run_error(source),
        RuntimeError::UnsupportedObject { .. }
    ));
}

#[test]
fn single_line_if_else() {
    let source = "For i = 1 To 3\n If i Mod 2 = 0 Then Debug.Print \"even\" Else Debug.Print \"odd\": Debug.Print i\nNext";
    assert_eq!(output(source), vec!["odd", "1", "even", "odd", "3"]);
}

#[test]
fn elseif_chain_picks_first_match() {
    let source = r#"
Function Grade(score)
    If score >= 90 Then
        Grade = "A"
    ElseIf score >= 80 Then
        Grade = "B"
    ElseIf score >= 70 Then
        Grade = "C"
    Else
        Grade = "F"
    End If
End Function
Debug.Print Grade(95), Grade(85), Grade(75), Grade(10)
"#;
    assert_eq!(output(source), vec!["A B C F"]);
}
