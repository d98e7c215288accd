//! Catalog repositories: clinic services, product categories and products.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use vetclinic_core::{CategoryId, ProductId, ServiceId};

use super::{RepositoryError, unique_violation};
use crate::models::{Category, ClinicService, Product};

// =============================================================================
// Services
// =============================================================================

const SERVICE_COLUMNS: &str = "id, name, description, price, duration_minutes, is_boarding, \
                               is_active, created_at, updated_at";

/// Service fields; `None` leaves a field unchanged on update.
#[derive(Debug, Default, Clone)]
pub struct ServiceFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub duration_minutes: Option<i32>,
    pub is_boarding: Option<bool>,
    pub is_active: Option<bool>,
}

pub struct ServiceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ServiceRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List services by name. Inactive services are hidden unless asked for.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<ClinicService>, RepositoryError> {
        let services = sqlx::query_as::<_, ClinicService>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM clinic.service WHERE is_active OR $1 ORDER BY name"
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;
        Ok(services)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ServiceId) -> Result<Option<ClinicService>, RepositoryError> {
        let service = sqlx::query_as::<_, ClinicService>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM clinic.service WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(service)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(
        &self,
        name: &str,
        price: Decimal,
        fields: &ServiceFields,
    ) -> Result<ClinicService, RepositoryError> {
        let service = sqlx::query_as::<_, ClinicService>(&format!(
            r"
            INSERT INTO clinic.service (name, description, price, duration_minutes, is_boarding, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SERVICE_COLUMNS}
            "
        ))
        .bind(name)
        .bind(fields.description.as_deref())
        .bind(price)
        .bind(fields.duration_minutes)
        .bind(fields.is_boarding.unwrap_or(false))
        .bind(fields.is_active.unwrap_or(true))
        .fetch_one(self.pool)
        .await
        .map_err(unique_violation("A service with this name already exists"))?;
        Ok(service)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the service doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        id: ServiceId,
        fields: &ServiceFields,
    ) -> Result<ClinicService, RepositoryError> {
        sqlx::query_as::<_, ClinicService>(&format!(
            r"
            UPDATE clinic.service
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                duration_minutes = COALESCE($5, duration_minutes),
                is_boarding = COALESCE($6, is_boarding),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SERVICE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(fields.name.as_deref())
        .bind(fields.description.as_deref())
        .bind(fields.price)
        .bind(fields.duration_minutes)
        .bind(fields.is_boarding)
        .bind(fields.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(unique_violation("A service with this name already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a service. Services referenced by appointments are deactivated
    /// instead so history keeps its foreign keys.
    ///
    /// Returns `true` when the row was removed, `false` when it was only
    /// deactivated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the service doesn't exist.
    pub async fn delete(&self, id: ServiceId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let in_use = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM clinic.appointment WHERE service_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let sql = if in_use {
            "UPDATE clinic.service SET is_active = FALSE, updated_at = NOW() WHERE id = $1"
        } else {
            "DELETE FROM clinic.service WHERE id = $1"
        };
        let result = sqlx::query(sql).bind(id).execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(!in_use)
    }
}

/// Lock and load a service inside a booking transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn service_for_booking(
    conn: &mut PgConnection,
    id: ServiceId,
) -> Result<Option<ClinicService>, RepositoryError> {
    let service = sqlx::query_as::<_, ClinicService>(&format!(
        "SELECT {SERVICE_COLUMNS} FROM clinic.service WHERE id = $1 AND is_active FOR SHARE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(service)
}

// =============================================================================
// Categories
// =============================================================================

pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM clinic.category ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Category, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            r"
            INSERT INTO clinic.category (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at
            ",
        )
        .bind(name)
        .bind(description)
        .fetch_one(self.pool)
        .await
        .map_err(unique_violation("A category with this name already exists"))?;
        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(
            r"
            UPDATE clinic.category
            SET name = COALESCE($2, name),
                description = COALESCE($3, description)
            WHERE id = $1
            RETURNING id, name, description, created_at
            ",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .fetch_optional(self.pool)
        .await
        .map_err(unique_violation("A category with this name already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a category. Its products become uncategorized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM clinic.category WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Products
// =============================================================================

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.category_id, c.name AS category_name, p.name, p.description,
           p.price, p.stock, p.image_url, p.created_at, p.updated_at
    FROM clinic.product p
    LEFT JOIN clinic.category c ON c.id = p.category_id
    WHERE NOT p.is_deleted
";

#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<CategoryId>,
}

/// Product fields; `None` leaves a field unchanged on update.
#[derive(Debug, Default, Clone)]
pub struct ProductFields {
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
}

pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products that have not been deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(PRODUCT_SELECT);

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            query
                .push(" AND (p.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(category) = filter.category {
            query.push(" AND p.category_id = ").push_bind(category);
        }
        query.push(" ORDER BY p.name, p.id");

        Ok(query.build_query_as::<Product>().fetch_all(self.pool).await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} AND p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        name: &str,
        price: Decimal,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        let id = sqlx::query_scalar::<_, ProductId>(
            r"
            INSERT INTO clinic.product (category_id, name, description, price, stock)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(fields.category_id)
        .bind(name)
        .bind(fields.description.as_deref())
        .bind(price)
        .bind(fields.stock.unwrap_or(0))
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE clinic.product
            SET category_id = COALESCE($2, category_id),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                price = COALESCE($5, price),
                stock = COALESCE($6, stock),
                updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            ",
        )
        .bind(id)
        .bind(fields.category_id)
        .bind(fields.name.as_deref())
        .bind(fields.description.as_deref())
        .bind(fields.price)
        .bind(fields.stock)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_image_url(&self, id: ProductId, url: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE clinic.product SET image_url = $2, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            ",
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

    /// Soft delete: the row stays for order history.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn soft_delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE clinic.product
            SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
