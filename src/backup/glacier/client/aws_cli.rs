use crate::backup::function_path;
use crate::backup::glacier::client::{ByteRange, PartBody, UploadId, VaultClient};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use crate::backup::validate::validate_dir_exist;
use bon::Builder;
use function_name::named;
use getset::Getters;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use validator::Validate;

static DEFAULT_PROGRAM: &str = "aws";
/// `-` tells the service to use the account owning the credentials.
static DEFAULT_ACCOUNT_ID: &str = "-";

/// Drives the vault through the `aws glacier` command line tool.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct AwsCliConfig {
    #[serde(default = "default_program")]
    #[builder(default = default_program(), into)]
    #[validate(length(min = 1))]
    program: String,
    #[serde(default = "default_account_id")]
    #[builder(default = default_account_id(), into)]
    #[validate(length(min = 1))]
    account_id: String,
    /// Inspect `~/.aws/config` and `~/.aws/credentials` before uploading
    #[serde(default = "default_check_config")]
    #[builder(default = true)]
    check_config: bool,
    #[builder(into)]
    #[validate(custom(function = validate_dir_exist))]
    working_dir: Option<PathBuf>,
}

fn default_program() -> String {
    DEFAULT_PROGRAM.to_string()
}

fn default_account_id() -> String {
    DEFAULT_ACCOUNT_ID.to_string()
}

fn default_check_config() -> bool {
    true
}

impl Default for AwsCliConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitiateResponse {
    upload_id: String,
}

#[derive(Deserialize)]
struct UploadPartResponse {
    checksum: String,
}

impl AwsCliConfig {
    #[named]
    pub fn verify(&self) -> Result<()> {
        which::which(&self.program)
            .map_err(|e| Error::client_not_ready(format!("{:?} not found: {}", self.program, e)))
            .add_fn_name(function_path!())?;

        if !self.check_config {
            return Ok(());
        }

        let home = dirs::home_dir()
            .ok_or_else(|| Error::client_not_ready("cannot locate home directory"))?;
        let config_path = home.join(".aws").join("config");
        let credentials_path = home.join(".aws").join("credentials");
        if !config_path.exists() || !credentials_path.exists() {
            tracing::error!(
                "AWS is not configured, please run aws tool with configure for current user"
            );
            return Err(Error::client_not_ready(format!(
                "missing {:?} or {:?}",
                config_path, credentials_path
            )));
        }

        let problems = check_aws_files(
            &std::fs::read_to_string(&config_path)?,
            &std::fs::read_to_string(&credentials_path)?,
        );
        if problems.is_empty() {
            return Ok(());
        }
        for problem in &problems {
            tracing::error!("AWS configuration {problem}");
        }
        tracing::error!("Please resolve issues by running aws tool with configure for current user");
        Err(Error::client_not_ready(problems.join(", ")))
    }

    fn command(&self, operation: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--output", "json", "glacier", operation]);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn run(&self, operation: &str, args: Vec<OsString>) -> Result<Vec<u8>> {
        let mut cmd = self.command(operation);
        cmd.args(args).args(["--account-id", self.account_id.as_str()]);
        tracing::trace!("AWS command: {:?}", cmd);

        let output = cmd
            .output()
            .map_err(Error::from)
            .add_msg(format!("Unable to run {:?}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if stderr.contains("RequestTimeoutException") {
                tracing::warn!("Timeout during {operation}");
            } else {
                tracing::debug!("{operation} stderr: {stderr}");
            }
            return Err(Error::vault_command(
                operation,
                output.status.to_string(),
                stderr,
            ));
        }

        Ok(output.stdout)
    }

    fn run_json<T: DeserializeOwned>(&self, operation: &str, args: Vec<OsString>) -> Result<T> {
        let stdout = self.run(operation, args)?;
        parse_response(operation, &stdout)
    }
}

fn parse_response<T: DeserializeOwned>(operation: &str, stdout: &[u8]) -> Result<T> {
    serde_json::from_slice(stdout).map_err(|e| {
        Error::malformed_response(
            operation,
            format!("{e}: {:?}", String::from_utf8_lossy(stdout)),
        )
    })
}

fn upload_id_json(upload_id: &UploadId) -> OsString {
    serde_json::json!({ "uploadId": upload_id.as_str() })
        .to_string()
        .into()
}

/// Names what is missing from the aws tool's config and credentials files.
fn check_aws_files(config: &str, credentials: &str) -> Vec<&'static str> {
    let config = config.to_lowercase();
    let credentials = credentials.to_lowercase();
    let has_region = config.lines().any(|l| l.contains("region"));
    let has_json = config
        .lines()
        .any(|l| l.contains("output") && l.contains("json"));

    let mut problems = Vec::new();
    if !has_region {
        problems.push("is missing region setting");
    }
    if !has_json {
        problems.push("is missing output setting or it's not set to JSON");
    }
    if !credentials.contains("aws_access_key_id") {
        problems.push("is missing aws_access_key_id");
    }
    if !credentials.contains("aws_secret_access_key") {
        problems.push("is missing aws_secret_access_key");
    }
    problems
}

impl VaultClient for AwsCliConfig {
    fn create_vault(&self, vault: &str) -> Result<()> {
        self.run("create-vault", vec!["--vault-name".into(), vault.into()])
            .add_msg(format!("Failed to create vault {vault:?}"))?;
        tracing::info!("Vault {vault:?} created");
        Ok(())
    }

    fn initiate(&self, vault: &str, description: &str, part_size: u64) -> Result<UploadId> {
        let response: InitiateResponse = self.run_json(
            "initiate-multipart-upload",
            vec![
                "--vault-name".into(),
                vault.into(),
                "--archive-description".into(),
                description.into(),
                "--part-size".into(),
                part_size.to_string().into(),
            ],
        )?;
        Ok(response.upload_id.into())
    }

    fn upload_part(
        &self,
        upload_id: &UploadId,
        vault: &str,
        range: ByteRange,
        body: PartBody<'_>,
    ) -> Result<String> {
        // The tool only reads bodies from disk.
        let spilled;
        let body_path = match body {
            PartBody::File(path) => path,
            PartBody::Memory(bytes) => {
                let mut file = tempfile::NamedTempFile::new()?;
                file.write_all(bytes)?;
                file.flush()?;
                spilled = file;
                spilled.path()
            }
        };

        let response: UploadPartResponse = self.run_json(
            "upload-multipart-part",
            vec![
                "--vault-name".into(),
                vault.into(),
                "--cli-input-json".into(),
                upload_id_json(upload_id),
                "--body".into(),
                body_path.into(),
                "--range".into(),
                range.to_string().into(),
            ],
        )?;
        Ok(response.checksum)
    }

    fn complete(
        &self,
        upload_id: &UploadId,
        vault: &str,
        root_digest_hex: &str,
        total_size: u64,
    ) -> Result<()> {
        self.run(
            "complete-multipart-upload",
            vec![
                "--vault-name".into(),
                vault.into(),
                "--cli-input-json".into(),
                upload_id_json(upload_id),
                "--checksum".into(),
                root_digest_hex.into(),
                "--archive-size".into(),
                total_size.to_string().into(),
            ],
        )
        .map(|_| ())
    }

    fn abort(&self, upload_id: &UploadId, vault: &str) -> Result<()> {
        self.run(
            "abort-multipart-upload",
            vec![
                "--vault-name".into(),
                vault.into(),
                "--cli-input-json".into(),
                upload_id_json(upload_id),
            ],
        )
        .map(|_| ())
    }
}
