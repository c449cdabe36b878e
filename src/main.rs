use std::path::PathBuf;
use std::process::ExitCode;

use angularjs_components::config::AjsConfig;
use angularjs_components::Workspace;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// AngularJS のコンポーネント/コントローラー登録を解析して JSON で出力する
#[derive(Debug, Parser)]
#[command(name = "angularjs-components", version)]
struct Cli {
    /// ワークスペースルート（ajsconfig.json とtemplateUrl の起点）
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// 解析するファイル（省略時はルート以下の全スクリプト）
    files: Vec<PathBuf>,

    /// 整形して出力する
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = std::path::absolute(&cli.root).unwrap_or_else(|_| cli.root.clone());
    let config = AjsConfig::load_from_dir(&root);

    let workspace = match Workspace::new(&root, &config) {
        Ok(workspace) => workspace,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = if cli.files.is_empty() {
        workspace.analyze_all().await
    } else {
        let files = cli
            .files
            .iter()
            .map(|file| std::path::absolute(file).unwrap_or_else(|_| file.clone()))
            .collect();
        workspace.analyze_paths(files).await
    };

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    };
    match json {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("failed to serialize report: {}", e);
            ExitCode::FAILURE
        }
    }
}
