use jack_compiler::compile_str;

#[test]
fn test_compile_seven() {
    match compile_str(include_str!("seven.jack")) {
        Ok(commands) => assert_eq!(commands, include_str!("seven.vm")),
        Err(err) => panic!("{}", err),
    }
}

#[test]
fn test_compile_point() {
    match compile_str(include_str!("point.jack")) {
        Ok(commands) => assert_eq!(commands, include_str!("point.vm")),
        Err(err) => panic!("{}", err),
    }
}

#[test]
fn test_compile_sums() {
    match compile_str(include_str!("sums.jack")) {
        Ok(commands) => assert_eq!(commands, include_str!("sums.vm")),
        Err(err) => panic!("{}", err),
    }
}
