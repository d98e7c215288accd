//! Pet repository.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use vetclinic_core::{PetId, UserId};

use super::RepositoryError;
use crate::models::Pet;

const PET_SELECT: &str = r"
    SELECT p.id, p.owner_id, u.name AS owner_name, p.name, p.species, p.breed,
           p.birth_date, p.weight_kg, p.gender, p.image_url, p.notes,
           p.created_at, p.updated_at
    FROM clinic.pet p
    JOIN clinic.user u ON u.id = p.owner_id
";

/// Listing filters. `owner` restricts to one client's pets.
#[derive(Debug, Default, Clone)]
pub struct PetFilter {
    pub owner: Option<UserId>,
    pub search: Option<String>,
    pub species: Option<String>,
}

/// Pet fields supplied on create; on update every field is optional.
#[derive(Debug, Default, Clone)]
pub struct PetFields {
    pub name: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub weight_kg: Option<Decimal>,
    pub gender: Option<String>,
    pub notes: Option<String>,
}

/// Repository for pet database operations.
pub struct PetRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PetRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List pets matching `filter`, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &PetFilter) -> Result<Vec<Pet>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(PET_SELECT);
        query.push(" WHERE TRUE");

        if let Some(owner) = filter.owner {
            query.push(" AND p.owner_id = ").push_bind(owner);
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            query
                .push(" AND (p.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.breed ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(species) = filter.species.as_deref().filter(|s| !s.trim().is_empty()) {
            query
                .push(" AND LOWER(p.species) = LOWER(")
                .push_bind(species.trim().to_owned())
                .push(")");
        }
        query.push(" ORDER BY p.name, p.id");

        Ok(query.build_query_as::<Pet>().fetch_all(self.pool).await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: PetId) -> Result<Option<Pet>, RepositoryError> {
        let pet = sqlx::query_as::<_, Pet>(&format!("{PET_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(pet)
    }

    /// Create a pet. `name` and `species` must already be validated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        owner: UserId,
        name: &str,
        species: &str,
        fields: &PetFields,
    ) -> Result<Pet, RepositoryError> {
        let id = sqlx::query_scalar::<_, PetId>(
            r"
            INSERT INTO clinic.pet (owner_id, name, species, breed, birth_date, weight_kg, gender, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(owner)
        .bind(name)
        .bind(species)
        .bind(fields.breed.as_deref())
        .bind(fields.birth_date)
        .bind(fields.weight_kg)
        .bind(fields.gender.as_deref())
        .bind(fields.notes.as_deref())
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the pet doesn't exist.
    pub async fn update(&self, id: PetId, fields: &PetFields) -> Result<Pet, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE clinic.pet
            SET name = COALESCE($2, name),
                species = COALESCE($3, species),
                breed = COALESCE($4, breed),
                birth_date = COALESCE($5, birth_date),
                weight_kg = COALESCE($6, weight_kg),
                gender = COALESCE($7, gender),
                notes = COALESCE($8, notes),
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(fields.name.as_deref())
        .bind(fields.species.as_deref())
        .bind(fields.breed.as_deref())
        .bind(fields.birth_date)
        .bind(fields.weight_kg)
        .bind(fields.gender.as_deref())
        .bind(fields.notes.as_deref())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Point the pet at a newly uploaded image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the pet doesn't exist.
    pub async fn set_image_url(&self, id: PetId, url: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE clinic.pet SET image_url = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(url)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the pet doesn't exist.
    pub async fn delete(&self, id: PetId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM clinic.pet WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
