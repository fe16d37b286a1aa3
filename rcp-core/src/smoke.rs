// rcp-core/src/smoke.rs
//! Runs a recipe's `test do` block against its installed keg.

use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use rcp_aio::process::run_command_async;
use rcp_common::error::{RcpError, Result, TestError};
use rcp_common::keg::KegRegistry;
use rcp_common::model::recipe::expand_template;
use rcp_common::model::TestStep;
use rcp_common::ValidRecipe;
use tracing::{debug, error};

/// Values for `#{…}` interpolation in test arguments.
#[derive(Debug, Clone)]
pub struct TestContext {
    pub keg: PathBuf,
    pub testpath: PathBuf,
    pub version: String,
}

impl TestContext {
    fn lookup(&self, name: &str) -> Option<String> {
        let path = match name {
            "bin" => self.keg.join("bin"),
            "libexec" => self.keg.join("libexec"),
            "prefix" => self.keg.clone(),
            "testpath" => self.testpath.clone(),
            "version" => return Some(self.version.clone()),
            _ => return None,
        };
        Some(path.to_string_lossy().into_owned())
    }

    /// `PATH` with the keg's `bin` first, so bare command names resolve to the
    /// freshly installed executables.
    fn search_path(&self) -> OsString {
        let mut dirs = vec![self.keg.join("bin")];
        if let Some(existing) = env::var_os("PATH") {
            dirs.extend(env::split_paths(&existing));
        }
        env::join_paths(dirs).unwrap_or_default()
    }
}

/// Runs every test step for the installed keg of `recipe`, stopping at the
/// first failure. Each run gets a fresh temporary directory as its working
/// directory, `HOME` and `#{testpath}`.
pub async fn run_test(recipe: &ValidRecipe, kegs: &KegRegistry) -> Result<()> {
    let keg = kegs.get_keg_path(&recipe.name, recipe.version());
    if !keg.is_dir() {
        return Err(RcpError::NotFound(format!(
            "{} {} is not installed ({})",
            recipe.name,
            recipe.version(),
            keg.display()
        )));
    }
    if recipe.test.is_empty() {
        debug!("Recipe '{}' declares no test steps.", recipe.name);
        return Ok(());
    }

    let testpath = tempfile::Builder::new()
        .prefix(&format!("{}-test-", recipe.name))
        .tempdir()?;
    let ctx = TestContext {
        keg,
        testpath: testpath.path().to_path_buf(),
        version: recipe.version().to_string(),
    };

    for (index, step) in recipe.test.iter().enumerate() {
        debug!("Test step {}: {}", index, step);
        run_step(step, &ctx).await?;
    }
    Ok(())
}

pub async fn run_step(step: &TestStep, ctx: &TestContext) -> Result<()> {
    let TestStep::ShellInvoke { argv } = step;
    // Values interpolated into a `sh -c` script are quoted so paths with
    // spaces stay one word.
    let script_index = match argv.as_slice() {
        [shell, flag, _, ..] if shell == "/bin/sh" && flag == "-c" => Some(2),
        _ => None,
    };
    let expanded = argv
        .iter()
        .enumerate()
        .map(|(index, arg)| {
            if Some(index) == script_index {
                expand_template(arg, |name| {
                    ctx.lookup(name)
                        .map(|value| shell_words::quote(&value).into_owned())
                })
            } else {
                expand_template(arg, |name| ctx.lookup(name))
            }
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(RcpError::Generic)?;
    let Some((program, args)) = expanded.split_first() else {
        return Err(TestError::CommandNotFound(String::new()).into());
    };
    let command_line = expanded.join(" ");

    let search_path = ctx.search_path();
    let resolved = resolve_program(program, &search_path, &ctx.testpath)
        .ok_or_else(|| TestError::CommandNotFound(program.clone()))?;

    let mut envs = HashMap::new();
    envs.insert(
        "PATH".to_string(),
        search_path.to_string_lossy().into_owned(),
    );
    envs.insert(
        "HOME".to_string(),
        ctx.testpath.to_string_lossy().into_owned(),
    );

    let output = run_command_async(
        resolved.to_string_lossy().into_owned(),
        args.to_vec(),
        Some(ctx.testpath.clone()),
        Some(envs),
    )
    .await
    .map_err(|e| match e {
        RcpError::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {
            RcpError::from(TestError::CommandNotFound(program.clone()))
        }
        other => other,
    })?;

    if output.status.success() {
        debug!("`{}` passed", command_line);
        return Ok(());
    }

    let code = exit_code(output.status);
    let stderr = String::from_utf8_lossy(&output.stderr);
    error!("`{}` exited with status {}", command_line, code);
    if !stderr.trim().is_empty() {
        error!("{}", stderr.trim());
    }
    Err(TestError::NonZeroExit {
        command: command_line,
        code,
    }
    .into())
}

fn resolve_program(program: &str, search_path: &OsString, cwd: &Path) -> Option<PathBuf> {
    if program.contains('/') {
        let path = Path::new(program);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        };
        return path.is_file().then_some(path);
    }
    which::which_in(program, Some(search_path), cwd).ok()
}

/// Exit status as a number; death by signal N is reported as 128 + N.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    fn context(dir: &Path) -> TestContext {
        let keg = dir.join("Cellar/tool/1.0.0");
        fs::create_dir_all(keg.join("bin")).unwrap();
        let script = keg.join("bin/tool");
        fs::write(
            &script,
            "#!/bin/sh\n[ \"$1\" = \"-v\" ] && { echo tool 1.0.0; exit 0; }\nexit 7\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let testpath = dir.join("testpath");
        fs::create_dir_all(&testpath).unwrap();
        TestContext {
            keg,
            testpath,
            version: "1.0.0".to_string(),
        }
    }

    #[tokio::test]
    async fn interpolated_binary_runs() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        run_step(&TestStep::shell(["#{bin}/tool", "-v"]), &ctx)
            .await
            .unwrap();
        // Bare names resolve through the keg's bin first.
        run_step(&TestStep::shell(["tool", "-v"]), &ctx).await.unwrap();
    }

    #[tokio::test]
    async fn nonzero_exit_carries_code() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let err = run_step(&TestStep::shell(["#{bin}/tool", "--bogus"]), &ctx)
            .await
            .unwrap_err();
        match err {
            RcpError::Test(TestError::NonZeroExit { code, command }) => {
                assert_eq!(code, 7);
                assert!(command.ends_with("bin/tool --bogus"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_command_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let err = run_step(&TestStep::shell(["#{bin}/missing", "-v"]), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RcpError::Test(TestError::CommandNotFound(ref c)) if c.ends_with("bin/missing")
        ));
        let err = run_step(&TestStep::shell(["rcp-no-such-command-xyz"]), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, RcpError::Test(TestError::CommandNotFound(_))));
    }

    #[tokio::test]
    async fn signal_death_maps_to_128_plus_signal() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let err = run_step(&TestStep::shell(["/bin/sh", "-c", "kill -9 $$"]), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RcpError::Test(TestError::NonZeroExit { code: 137, .. })
        ));
    }

    #[tokio::test]
    async fn shell_scripts_survive_spaces_in_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir.path().join("Application Support/rcp"));
        run_step(
            &TestStep::shell(["/bin/sh", "-c", "#{bin}/tool -v | grep -q 1.0.0"]),
            &ctx,
        )
        .await
        .unwrap();
        run_step(&TestStep::shell(["#{bin}/tool", "-v"]), &ctx)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn testpath_is_cwd_and_home() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let check = format!(
            "[ \"$(pwd -P)\" = \"$(cd '{}' && pwd -P)\" ] && [ \"$HOME\" = '{}' ]",
            ctx.testpath.display(),
            ctx.testpath.display()
        );
        run_step(&TestStep::shell(["/bin/sh", "-c", check.as_str()]), &ctx)
            .await
            .unwrap();
    }
}
