
use assert_cmd::assert::Assert;
use assert_cmd::Command;

use crate::util::workspace::Workspace;


const BIN_NAME: &'static str = "lumos";


pub fn cmd() -> Command {
	Command::cargo_bin(BIN_NAME)
		.unwrap()
}


/// A lumos subcommand reading the given config, writing into the workspace's output and temp folders
pub fn lumos(ws: &Workspace, config: impl AsRef<str>, command: &str) -> Command {
	let config = ws.write_config(config);
	let mut cmd = cmd();
	cmd.arg("--config-file").arg(config)
		.arg(command)
		.arg("--output-path").arg(ws.output_dir())
		.arg("--temp-path").arg(ws.temp_dir());
	cmd
}


pub trait AssertExt {
	fn print_stdout(self) -> Self;
	fn print_stderr(self) -> Self;

	/// the `ERROR: ...` report of a failed run, with its whole cause chain
	fn error_report(&self) -> Option<String>;
}

impl AssertExt for Assert {

	fn print_stdout(self) -> Self {
		println!("STDOUT:\n{}", String::from_utf8_lossy(&self.get_output().stdout));
		self
	}

	fn print_stderr(self) -> Self {
		println!("STDERR:\n{}", String::from_utf8_lossy(&self.get_output().stderr));
		self
	}

	fn error_report(&self) -> Option<String> {
		let stdout = String::from_utf8_lossy(&self.get_output().stdout);
		stdout.find("ERROR: ")
			.map(|start| stdout[start ..].to_string())
	}
}
