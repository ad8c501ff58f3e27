use super::HardwareError;
use std::process;

fn program_name(command: &process::Command) -> String {
    command.get_program().to_string_lossy().into_owned()
}

pub(super) fn run(mut command: process::Command) -> Result<process::Output, HardwareError> {
    log::debug!("Running {command:?}");
    let output = command.output().map_err(|source| HardwareError::Spawn {
        program: program_name(&command),
        source,
    })?;

    log::debug!("Output: {output:?}");

    if !output.status.success() {
        return Err(HardwareError::CommandFailed {
            program: program_name(&command),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}

pub(super) fn stdout_utf8(
    output: process::Output,
    what: &'static str,
) -> Result<String, HardwareError> {
    String::from_utf8(output.stdout).map_err(|err| HardwareError::Parse {
        what,
        reason: err.to_string(),
    })
}

#[cfg(test)]
pub(super) fn assert_command_eq(
    actual: &std::process::Command,
    expected_program: &str,
    expected_args: &[&str],
) {
    assert_eq!(
        actual
            .get_program()
            .to_str()
            .expect("program name is not valid utf-8"),
        expected_program
    );

    let actual_args: Vec<&str> = actual
        .get_args()
        .map(|arg| arg.to_str().expect("argument is not valid utf-8"))
        .collect();

    assert_eq!(actual_args, expected_args);
}
