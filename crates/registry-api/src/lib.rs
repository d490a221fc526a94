//! Typed API for the pet registry backend
//!
//! Pets and tutors are plain REST collections under `/v1`. Every call goes
//! through [`AuthClient::send`], so token recovery is invisible here. Non-2xx
//! responses become [`Error::Status`] with the body kept for diagnostics.

pub mod error;
pub mod models;

use std::marker::PhantomData;
use std::sync::Arc;

use registry_client::{ApiRequest, AuthClient, FilePart};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

pub use error::{Error, Result};
pub use models::{Page, PageQuery, Pet, PetInput, Photo, Tutor, TutorInput, photo_part};

pub const PETS_PATH: &str = "/v1/pets";
pub const TUTORS_PATH: &str = "/v1/tutors";

/// Entry point bundling both collections over one client.
#[derive(Clone)]
pub struct RegistryApi {
    client: Arc<AuthClient>,
}

impl RegistryApi {
    pub fn new(client: Arc<AuthClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<AuthClient> {
        &self.client
    }

    pub fn pets(&self) -> Pets<'_> {
        Collection::new(&self.client, PETS_PATH)
    }

    pub fn tutors(&self) -> Tutors<'_> {
        Collection::new(&self.client, TUTORS_PATH)
    }
}

pub type Pets<'a> = Collection<'a, Pet, PetInput>;
pub type Tutors<'a> = Collection<'a, Tutor, TutorInput>;

/// CRUD and photo operations shared by pets and tutors.
pub struct Collection<'a, T, I> {
    client: &'a AuthClient,
    base: &'static str,
    _marker: PhantomData<fn(&I) -> T>,
}

impl<'a, T, I> Collection<'a, T, I>
where
    T: DeserializeOwned,
    I: Serialize,
{
    fn new(client: &'a AuthClient, base: &'static str) -> Self {
        Self {
            client,
            base,
            _marker: PhantomData,
        }
    }

    fn item(&self, id: u64) -> String {
        format!("{}/{id}", self.base)
    }

    #[instrument(skip_all, fields(collection = self.base, page = query.page, size = query.size))]
    pub async fn list(&self, query: &PageQuery) -> Result<Page<T>> {
        let request = query.apply(ApiRequest::get(self.base));
        decode(self.client.send(&request).await?).await
    }

    #[instrument(skip(self), fields(collection = self.base))]
    pub async fn get(&self, id: u64) -> Result<T> {
        decode(self.client.send(&ApiRequest::get(self.item(id))).await?).await
    }

    #[instrument(skip_all, fields(collection = self.base))]
    pub async fn create(&self, input: &I) -> Result<T> {
        let request = ApiRequest::post(self.base).json(input)?;
        decode(self.client.send(&request).await?).await
    }

    #[instrument(skip(self, input), fields(collection = self.base))]
    pub async fn update(&self, id: u64, input: &I) -> Result<T> {
        let request = ApiRequest::put(self.item(id)).json(input)?;
        decode(self.client.send(&request).await?).await
    }

    #[instrument(skip(self), fields(collection = self.base))]
    pub async fn delete(&self, id: u64) -> Result<()> {
        expect_success(self.client.send(&ApiRequest::delete(self.item(id))).await?).await
    }

    #[instrument(skip(self, photo), fields(collection = self.base, file = %photo.file_name))]
    pub async fn upload_photo(&self, id: u64, photo: FilePart) -> Result<Photo> {
        let request = ApiRequest::post(format!("{}/photos", self.item(id))).file(photo);
        decode(self.client.send(&request).await?).await
    }

    #[instrument(skip(self), fields(collection = self.base))]
    pub async fn delete_photo(&self, id: u64, photo_id: u64) -> Result<()> {
        let request = ApiRequest::delete(format!("{}/photos/{photo_id}", self.item(id)));
        expect_success(self.client.send(&request).await?).await
    }
}

impl Tutors<'_> {
    /// Link a pet to a tutor.
    #[instrument(skip(self))]
    pub async fn link_pet(&self, tutor_id: u64, pet_id: u64) -> Result<()> {
        let request = ApiRequest::post(format!("{}/pets/{pet_id}", self.item(tutor_id)));
        expect_success(self.client.send(&request).await?).await
    }

    #[instrument(skip(self))]
    pub async fn unlink_pet(&self, tutor_id: u64, pet_id: u64) -> Result<()> {
        let request = ApiRequest::delete(format!("{}/pets/{pet_id}", self.item(tutor_id)));
        expect_success(self.client.send(&request).await?).await
    }
}

async fn expect_success(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    debug!(%status, "backend rejected request");
    Err(Error::Status { status, body })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if !status.is_success() {
        debug!(%status, "backend rejected request");
        return Err(Error::Status {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))
}
