use std::{env, fs, process::ExitCode};

use decaf::{Config, MethodInput, decompile_method};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map_or("decaf", String::as_str);

    let mut config = Config::default();
    let mut files: Vec<&str> = Vec::new();

    if args.len() <= 1 {
        println!("Usage: {program} [options] <method files>");
        return ExitCode::FAILURE;
    }

    for arg in &args[1..] {
        if arg.len() > 1 && arg.starts_with('-') {
            match arg.as_str() {
                "-h" | "--help" | "-?" => {
                    println!("Usage: {program} [options] <method files>");
                    println!("  -h, --help, -?        show this message and exit");
                    println!("  -f, --fail-on-error   abort on the first method that fails to decompile");
                    return ExitCode::SUCCESS;
                }
                "-f" | "--fail-on-error" => config.fail_on_error = true,
                other => {
                    eprintln!("{program}: Unknown option {other}");
                    eprintln!("Use {program} --help for more information");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            files.push(arg);
        }
    }

    if files.is_empty() {
        eprintln!("{program}: no input files");
        return ExitCode::FAILURE;
    }

    for file in files {
        let contents = match fs::read_to_string(file) {
            Ok(contents) => contents,
            Err(err) => {
                eprintln!("error reading {file}: {err}");
                return ExitCode::FAILURE;
            }
        };
        let methods = match parse_methods(&contents) {
            Ok(methods) => methods,
            Err(err) => {
                eprintln!("error parsing {file}: {err}");
                return ExitCode::FAILURE;
            }
        };
        for method in &methods {
            match decompile_method(method, &config) {
                Ok(output) => {
                    print!("{}", output.source);
                    for warning in &output.diagnostics {
                        eprintln!("{file}: {}.{}: warning: {warning}", method.class_name, method.name);
                    }
                }
                Err(err) => {
                    eprintln!("{file}: {}.{}: error: {err}", method.class_name, method.name);
                    return ExitCode::FAILURE;
                }
            }
        }
    }
    ExitCode::SUCCESS
}

/// A method file holds either one `MethodInput` or an array of them.
fn parse_methods(contents: &str) -> Result<Vec<MethodInput>, serde_json::Error> {
    match serde_json::from_str::<Vec<MethodInput>>(contents) {
        Ok(methods) => Ok(methods),
        Err(_) => serde_json::from_str::<MethodInput>(contents).map(|m| vec![m]),
    }
}
