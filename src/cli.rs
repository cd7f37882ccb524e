use anyhow::{bail, ensure, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use regex::Regex;
use std::path::PathBuf;
use tracing::debug;
use tracing::level_filters::LevelFilter;

use crate::config::{FileConfig, InvocationConfig};
use crate::output::{ExitStatus, Router};
use crate::pipeline::Pipeline;
use crate::request::AssumptionRequest;
use crate::session::{self, ProfileCatalog};
use crate::store::CredentialStore;
use crate::sts::StsExchange;

#[derive(Debug, Clone, Parser)]
#[command(name = "aws-cred-gen", version, about = "Assume an AWS role and save the temporary credentials", long_about = None)]
pub struct Cli {
    #[arg(long, global = true, env = "AWS_PROFILE", help = "The AWS credential profile to use when assuming the new role")]
    pub profile: Option<String>,

    #[arg(long, global = true, help = "AWS output format written to the saved profile [default: json]")]
    pub output: Option<String>,

    #[arg(long, global = true, help = "AWS region written to the saved profile [default: us-west-2]")]
    pub region: Option<String>,

    #[arg(long, global = true, env = "AWS_CRED_GEN_CONFIG", help = "Path to a TOML file with default settings")]
    pub config: Option<PathBuf>,

    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Manage AWS Roles")]
    Role {
        #[command(subcommand)]
        command: RoleCommands,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum RoleCommands {
    #[command(about = "Assume a role by ARN")]
    Assume(AssumeArgs),
    #[command(about = "Assume OrganizationAccountAccessRole in a member account")]
    AssumeOrg(AssumeOrgArgs),
}

#[derive(Debug, Clone, Args)]
pub struct AssumeArgs {
    #[arg(short = 'r', long, help = "ARN of the role to assume")]
    pub role_arn: String,

    #[arg(short = 's', long, help = "Role session name")]
    pub session: String,

    #[command(flatten)]
    pub target: Target,
}

#[derive(Debug, Clone, Args)]
pub struct AssumeOrgArgs {
    #[arg(short = 'a', long, help = "12 digit AWS account number")]
    pub account: String,

    #[arg(short = 's', long, help = "Role session name [default: current user name]")]
    pub session: Option<String>,

    #[command(flatten)]
    pub target: Target,
}

#[derive(Debug, Clone, Args)]
pub struct Target {
    #[arg(short = 'p', long, help = "Profile to save the credentials under")]
    pub save_profile: String,

    #[arg(short = 'e', long, help = "External ID required by the role's trust policy")]
    pub external_id: Option<String>,

    #[arg(long, help = "Print the credentials as JSON instead of saving them")]
    pub stdout: bool,
}

impl Cli {
    pub async fn execute(self) -> Result<ExitStatus> {
        self.validate_arguments()?;

        let file = FileConfig::load(self.config.as_deref())?;
        let invocation = InvocationConfig::new(self.profile, self.output, self.region, file);
        debug!("Invocation: {:?}", invocation);

        let Some(Commands::Role { command }) = self.command else {
            bail!("No command given");
        };
        let (request, target) = match command {
            RoleCommands::Assume(mut args) => (
                AssumptionRequest::direct(
                    args.role_arn,
                    args.session,
                    args.target.external_id.take(),
                ),
                args.target,
            ),
            RoleCommands::AssumeOrg(mut args) => (
                AssumptionRequest::organization(
                    &args.account,
                    args.session,
                    args.target.external_id.take(),
                ),
                args.target,
            ),
        };

        let mut router = Router::stdio(target.stdout);
        let identity = session::resolve(invocation.profile.as_deref(), &ProfileCatalog::load());
        router.status(format!(
            "Creating session with profile: {}",
            identity.display_name()
        ))?;
        let sdk_config = identity.load_config(&invocation.region).await;
        let exchange = StsExchange::new(&sdk_config, identity);
        let store = CredentialStore::default_location()?;

        Pipeline::new(exchange, &store, &invocation)
            .run(&request, &target.save_profile, &mut router)
            .await
    }

    /// Log level for `-v` repetitions; `RUST_LOG` takes precedence.
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    pub fn validate_arguments(&self) -> Result<()> {
        let Some(Commands::Role { command }) = &self.command else {
            bail!("A command is required, see --help");
        };
        let target = match command {
            RoleCommands::Assume(args) => {
                ensure!(!args.role_arn.trim().is_empty(), "--role-arn must not be empty");
                ensure!(!args.session.trim().is_empty(), "--session must not be empty");
                &args.target
            }
            RoleCommands::AssumeOrg(args) => {
                let account = Regex::new(r"^\d{12}$").context("Invalid account pattern")?;
                ensure!(
                    account.is_match(&args.account),
                    "--account must be a 12 digit AWS account number: {}",
                    args.account
                );
                &args.target
            }
        };
        ensure!(
            !target.save_profile.trim().is_empty(),
            "--save-profile must not be empty"
        );
        Ok(())
    }
}
