//! Explicit client context: who is acting, and where their documents live.
//!
//! Every operation that needs identity or persistence goes through a
//! `ClientContext` handed in by the caller.

use crate::store::MedicineStore;
use crate::{Error, Medicine, MedicineInput, Result, UserProfile};
use uuid::Uuid;

pub struct ClientContext<S: MedicineStore> {
    identity: Option<UserProfile>,
    store: S,
}

impl<S: MedicineStore> ClientContext<S> {
    pub fn new(store: S, identity: Option<UserProfile>) -> Self {
        Self { identity, store }
    }

    pub fn identity(&self) -> Option<&UserProfile> {
        self.identity.as_ref()
    }

    /// The logged-in user, or `NotAuthenticated`
    pub fn require_user(&self) -> Result<&UserProfile> {
        self.identity.as_ref().ok_or(Error::NotAuthenticated)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate and persist a new medicine for the current user
    pub fn add_medicine(&mut self, input: MedicineInput) -> Result<Medicine> {
        let owner_id = self.require_user()?.id;
        let medicine = Medicine::new(owner_id, input)?;
        self.store.insert(&medicine)?;
        tracing::info!(
            "Added medicine {} ({}) for {}",
            medicine.id,
            medicine.frequency,
            owner_id
        );
        Ok(medicine)
    }

    /// The current user's medicines, optionally filtered by a
    /// case-insensitive name search
    pub fn medicines(&self, search: Option<&str>) -> Result<Vec<Medicine>> {
        let owner_id = self.require_user()?.id;
        let mut medicines = self.store.list_for_owner(owner_id)?;

        if let Some(query) = search.map(|q| q.trim().to_lowercase()) {
            if !query.is_empty() {
                medicines.retain(|m| m.name().to_lowercase().contains(&query));
            }
        }

        Ok(medicines)
    }

    pub fn medicine(&self, id: Uuid) -> Result<Medicine> {
        self.medicines(None)?
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::NotFound(format!("medicine {}", id)))
    }

    /// Resolve a full id or a unique id prefix to one medicine
    pub fn resolve(&self, id_or_prefix: &str) -> Result<Medicine> {
        if let Ok(id) = Uuid::parse_str(id_or_prefix) {
            return self.medicine(id);
        }

        let prefix = id_or_prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return Err(Error::NotFound("empty medicine id".into()));
        }

        let mut matches: Vec<Medicine> = self
            .medicines(None)?
            .into_iter()
            .filter(|m| m.id.to_string().starts_with(&prefix))
            .collect();

        match matches.len() {
            0 => Err(Error::NotFound(format!("medicine {}", id_or_prefix))),
            1 => Ok(matches.remove(0)),
            n => Err(Error::Other(format!(
                "id prefix '{}' is ambiguous ({} medicines match)",
                id_or_prefix, n
            ))),
        }
    }

    pub fn delete_medicine(&mut self, id: Uuid) -> Result<()> {
        let owner_id = self.require_user()?.id;
        if self.store.remove(owner_id, id)? {
            tracing::info!("Deleted medicine {}", id);
            Ok(())
        } else {
            Err(Error::NotFound(format!("medicine {}", id)))
        }
    }
}
