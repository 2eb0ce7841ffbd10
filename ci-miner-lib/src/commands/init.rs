use super::Host;
use crate::config::{CONFIG_FILE_NAME, Config};
use crate::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use ohno::bail;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output configuration file path (default is `ci-miner.toml` in the current directory)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn init_config<H: Host>(host: &mut H, args: &InitArgs) -> Result<()> {
    let output = args.output.clone().unwrap_or_else(|| Utf8PathBuf::from(CONFIG_FILE_NAME));

    if output.exists() && !args.force {
        bail!("'{output}' already exists, use --force to overwrite it");
    }

    Config::save_default(&output)?;
    let _ = writeln!(host.output(), "Generated default configuration file: {output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("ci-miner.toml")).unwrap();

        let mut host = TestHost::new();
        let args = InitArgs {
            output: Some(path.clone()),
            force: false,
        };
        init_config(&mut host, &args).unwrap();
        assert!(host.output_text().contains("Generated default configuration file"));

        let config = Config::load(path.parent().unwrap(), Some(&path)).unwrap();
        assert_eq!(config.window_days, 365);

        // A second run refuses to clobber the file unless forced
        let _ = init_config(&mut host, &args).unwrap_err();
        init_config(&mut host, &InitArgs { output: Some(path), force: true }).unwrap();
    }
}
