//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `config.rs`, `acquire/`, `batch/`, `utils/`
//! - 子模块: fetch, resolve

pub mod fetch;
pub mod resolve;

use crate::acquire::substitution::builtin_references;
use crate::acquire::{
    LocalLibrary, MaterialsProjectClient, PipelineContext, RetryExecutor,
    StructureAcquisitionPipeline, StructureDatabase, SubstitutionPredictor, ThreadSleeper,
};
use crate::cli::pipeline::PipelineArgs;
use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::Result;
use crate::utils::output;

use std::sync::Arc;
use std::time::Duration;

/// 执行命令
pub fn run(cli: Cli) -> Result<()> {
    let config = Config::discover(cli.config.as_deref())?;
    match cli.command {
        Commands::Fetch(args) => fetch::execute(args, config),
        Commands::Resolve(args) => resolve::execute(args, config),
    }
}

/// 命令行参数覆盖配置文件，合并后重新检查取值范围
pub fn apply_overrides(config: &mut Config, args: &PipelineArgs) -> Result<()> {
    if let Some(key) = &args.api_key {
        config.database.api_key = Some(key.clone());
    }
    if let Some(endpoint) = &args.endpoint {
        config.database.endpoint = endpoint.clone();
    }
    if let Some(library) = &args.library {
        config.database.library = Some(library.clone());
    }
    if let Some(n) = args.max_retries {
        config.retry.max_retries = n;
    }
    if let Some(base) = args.backoff_base {
        config.retry.backoff_base = base;
    }
    if let Some(delay) = args.base_delay {
        config.retry.base_delay_secs = delay;
    }
    if let Some(threshold) = args.threshold {
        config.substitution.threshold = threshold;
    }
    if args.lenient {
        config.pipeline.strict_stoichiometry = false;
    }
    config.validate("command line")
}

/// 根据配置组装流水线
///
/// 本地结构库优先于在线数据库；库中的结构同时加入元素替换的参考库。
pub fn build_pipeline(config: &Config, offline: bool) -> Result<StructureAcquisitionPipeline> {
    let library = match &config.database.library {
        Some(dir) => Some(LocalLibrary::open(dir)?),
        None => None,
    };

    let mut substitution = SubstitutionPredictor::new(
        builtin_references(),
        config.substitution.threshold,
    );
    if let Some(lib) = &library {
        substitution = substitution.with_references(lib.structures());
    }

    let database: Option<Box<dyn StructureDatabase>> = if offline {
        output::print_info("Offline mode: database stage disabled");
        None
    } else if let Some(lib) = library {
        output::print_info(&format!("Using local structure library ({} entries)", lib.len()));
        Some(Box::new(lib))
    } else if let Some(key) = config.database.api_key.as_deref().filter(|k| !k.is_empty()) {
        let client = MaterialsProjectClient::new(
            &config.database.endpoint,
            key,
            Duration::from_secs(config.database.timeout_secs),
        )?;
        output::print_info(&format!("Using Materials Project at {}", config.database.endpoint));
        Some(Box::new(client))
    } else {
        output::print_warning("No API key or library configured: database stage disabled");
        None
    };

    let retry = RetryExecutor::new(config.retry.policy(), Arc::new(ThreadSleeper));
    Ok(StructureAcquisitionPipeline::new(
        PipelineContext::new(database),
        retry,
        substitution,
    )
    .with_options(config.pipeline.options()))
}
