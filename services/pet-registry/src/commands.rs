//! Subcommands and their execution
//!
//! Every command produces a JSON value; `main` prints it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use registry_api::{PageQuery, PetInput, RegistryApi, TutorInput, photo_part};
use serde_json::{Value, json};
use registry_client::AuthClient;
use tracing::{debug, info, warn};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in with the configured credentials and store the session
    Login,
    /// Forget the stored session
    Logout,
    /// Report whether a usable session is stored
    Status,
    /// Check that the backend is reachable
    Health,
    /// Manage pets
    #[command(subcommand)]
    Pets(PetCommand),
    /// Manage tutors
    #[command(subcommand)]
    Tutors(TutorCommand),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Zero-based page number
    #[arg(long, default_value_t = 0)]
    page: u32,
    #[arg(long, default_value_t = 10)]
    size: u32,
    /// Filter by name
    #[arg(long)]
    name: Option<String>,
}

impl From<ListArgs> for PageQuery {
    fn from(args: ListArgs) -> Self {
        PageQuery {
            page: args.page,
            size: args.size,
            name: args.name,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum PetCommand {
    List(ListArgs),
    Get {
        id: u64,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        breed: Option<String>,
        #[arg(long)]
        age: Option<u32>,
    },
    Delete {
        id: u64,
    },
    /// Attach a photo read from a local file
    UploadPhoto {
        id: u64,
        file: PathBuf,
    },
    DeletePhoto {
        id: u64,
        photo_id: u64,
    },
}

#[derive(Debug, Subcommand)]
pub enum TutorCommand {
    List(ListArgs),
    Get {
        id: u64,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        /// Identity document number
        #[arg(long)]
        document: Option<String>,
    },
    Delete {
        id: u64,
    },
    /// Link a pet to a tutor
    Link {
        tutor_id: u64,
        pet_id: u64,
    },
    /// Remove a pet from a tutor
    Unlink {
        tutor_id: u64,
        pet_id: u64,
    },
}

impl Command {
    pub async fn execute(self, api: &RegistryApi) -> Result<Value> {
        let client = api.client();
        match self {
            Command::Login => {
                let outcome = client.login().await.context("login failed")?;
                info!("session stored");
                Ok(json!({"authenticated": true, "user": outcome.user}))
            }
            Command::Logout => {
                client.logout().await.context("logout failed")?;
                Ok(json!({"authenticated": false}))
            }
            Command::Status => {
                let authenticated = client
                    .restore_session()
                    .await
                    .context("failed to read stored session")?;
                Ok(json!({"authenticated": authenticated}))
            }
            Command::Health => Ok(json!({"healthy": client.probe_health().await})),
            Command::Pets(command) => {
                restore_session(client).await;
                command.execute(api).await
            }
            Command::Tutors(command) => {
                restore_session(client).await;
                command.execute(api).await
            }
        }
    }
}

/// Drop a stored token that has already expired so the first request logs in
/// instead of spending a round trip on a refresh. Failure here is not fatal.
async fn restore_session(client: &AuthClient) {
    match client.restore_session().await {
        Ok(active) => debug!(active, "stored session checked"),
        Err(e) => warn!(error = %e, "failed to restore stored session"),
    }
}

impl PetCommand {
    async fn execute(self, api: &RegistryApi) -> Result<Value> {
        let pets = api.pets();
        let value = match self {
            PetCommand::List(args) => serde_json::to_value(pets.list(&args.into()).await?)?,
            PetCommand::Get { id } => serde_json::to_value(pets.get(id).await?)?,
            PetCommand::Create { name, breed, age } => {
                let input = PetInput { name, breed, age };
                serde_json::to_value(pets.create(&input).await?)?
            }
            PetCommand::Delete { id } => {
                pets.delete(id).await?;
                json!({"deleted": id})
            }
            PetCommand::UploadPhoto { id, file } => {
                let bytes = tokio::fs::read(&file)
                    .await
                    .with_context(|| format!("failed to read {}", file.display()))?;
                let file_name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "photo".to_string());
                serde_json::to_value(pets.upload_photo(id, photo_part(file_name, bytes)).await?)?
            }
            PetCommand::DeletePhoto { id, photo_id } => {
                pets.delete_photo(id, photo_id).await?;
                json!({"deleted": photo_id})
            }
        };
        Ok(value)
    }
}

impl TutorCommand {
    async fn execute(self, api: &RegistryApi) -> Result<Value> {
        let tutors = api.tutors();
        let value = match self {
            TutorCommand::List(args) => serde_json::to_value(tutors.list(&args.into()).await?)?,
            TutorCommand::Get { id } => serde_json::to_value(tutors.get(id).await?)?,
            TutorCommand::Create {
                name,
                email,
                phone,
                address,
                document,
            } => {
                let input = TutorInput {
                    name,
                    email,
                    phone,
                    address,
                    document,
                };
                serde_json::to_value(tutors.create(&input).await?)?
            }
            TutorCommand::Delete { id } => {
                tutors.delete(id).await?;
                json!({"deleted": id})
            }
            TutorCommand::Link { tutor_id, pet_id } => {
                tutors.link_pet(tutor_id, pet_id).await?;
                json!({"tutorId": tutor_id, "petId": pet_id, "linked": true})
            }
            TutorCommand::Unlink { tutor_id, pet_id } => {
                tutors.unlink_pet(tutor_id, pet_id).await?;
                json!({"tutorId": tutor_id, "petId": pet_id, "linked": false})
            }
        };
        Ok(value)
    }
}
