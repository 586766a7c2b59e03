use std::io::{BufRead, Write};

use batchlint_core::error::CliError;
use batchlint_core::worker::{serve, ItemProcessor, ProcessorFactory};
use batchlint_plugins::factory;

use super::cli::WorkerArgs;

/// Serve one assignment over stdin/stdout.
///
/// An unknown analyzer is still answered with a failure message so the parent
/// sees a batch error rather than a silent exit. Logs go to stderr only.
pub fn run(args: &WorkerArgs) -> Result<i32, CliError> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run_with(args, stdin.lock(), stdout.lock())?;
    Ok(0)
}

pub fn run_with<R, W>(args: &WorkerArgs, reader: R, writer: W) -> Result<(), CliError>
where
    R: BufRead,
    W: Write,
{
    match factory::build_analyzer(&args.analyzer) {
        Ok(analyzer) => serve(analyzer.as_ref(), reader, writer)?,
        Err(e) => {
            tracing::error!(analyzer = %args.analyzer, error = %e, "cannot build analyzer");
            let reason = format!("{e:#}");
            let failing = move |_: &serde_json::Value| -> anyhow::Result<Box<dyn ItemProcessor>> {
                Err(anyhow::anyhow!("{reason}"))
            };
            serve(&failing as &dyn ProcessorFactory, reader, writer)?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use batchlint_core::worker::UnitMessage;

    use super::*;

    fn answer(analyzer: &str, input: &str) -> UnitMessage {
        let mut out = Vec::new();
        run_with(
            &WorkerArgs {
                analyzer: analyzer.to_string(),
            },
            Cursor::new(input.as_bytes()),
            &mut out,
        )
        .unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn analyzes_assigned_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.css");
        std::fs::write(&file, "a {}\nb {} \n").unwrap();

        let input = serde_json::json!({
            "task_id": 0,
            "items": [file.to_str().unwrap()],
            "config": {}
        })
        .to_string();

        let UnitMessage::Success { items } = answer("text-stats", &input) else {
            panic!("expected success");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].outcome.as_ref().unwrap()["lines"], 2);
        assert_eq!(
            items[0].outcome.as_ref().unwrap()["trailing_whitespace"],
            serde_json::json!([2])
        );
    }

    #[test]
    fn unknown_analyzer_reports_failure() {
        let msg = answer("nope", r#"{"task_id":1,"items":["a.css"]}"#);
        let UnitMessage::Failure { error } = msg else {
            panic!("expected failure");
        };
        assert!(error.contains("unknown analyzer `nope`"));
    }

    #[test]
    fn bad_analyzer_config_reports_failure() {
        let msg = answer(
            "text-stats",
            r#"{"task_id":1,"items":["a.css"],"config":{"max_line_length":0}}"#,
        );
        assert!(matches!(msg, UnitMessage::Failure { .. }));
    }
}
