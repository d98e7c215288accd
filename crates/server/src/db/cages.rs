//! Cage repository: CRUD, availability and reservation bookkeeping.
//!
//! Availability is a `NOT EXISTS` over active reservations using the
//! inclusive overlap test from [`vetclinic_core::StayRange::overlaps`]. The
//! same predicate backs [`has_overlapping_reservation`], which booking runs
//! under a row lock on the cage.

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use vetclinic_core::{
    AppointmentId, CageId, CageStatus, CageType, DailyRate, PetId, ReservationId,
    ReservationStatus, StayRange,
};

use super::{RepositoryError, unique_violation};
use crate::models::{Cage, CageListing, CageReservation};

const CAGE_COLUMNS: &str = "c.id, c.cage_number, c.cage_type, c.capacity, c.daily_rate, \
                            c.status, c.current_pet_id, c.current_appointment_id, \
                            c.check_in_date, c.check_out_date, c.notes, c.created_at, c.updated_at";

const RESERVATION_COLUMNS: &str = "id, cage_id, appointment_id, check_in_date, check_out_date, \
                                   status, created_at, updated_at";

/// Optional `status` / `type` filters for cage listings.
#[derive(Debug, Default, Clone, Copy)]
pub struct CageFilter {
    pub status: Option<CageStatus>,
    pub cage_type: Option<CageType>,
}

impl CageFilter {
    fn push(self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(status) = self.status {
            query.push(" AND c.status = ").push_bind(status);
        }
        if let Some(cage_type) = self.cage_type {
            query.push(" AND c.cage_type = ").push_bind(cage_type);
        }
    }
}

/// A validated cage to insert.
#[derive(Debug, Clone)]
pub struct NewCage {
    pub cage_number: String,
    pub cage_type: CageType,
    pub capacity: i32,
    pub daily_rate: DailyRate,
    pub notes: Option<String>,
}

/// Partial cage update.
#[derive(Debug, Default, Clone)]
pub struct CageChanges {
    pub cage_number: Option<String>,
    pub cage_type: Option<CageType>,
    pub capacity: Option<i32>,
    pub daily_rate: Option<DailyRate>,
    pub status: Option<CageStatus>,
    pub notes: Option<String>,
}

/// Repository for cage database operations.
pub struct CageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CageRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Cages with no active reservation overlapping `stay`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_available(
        &self,
        stay: StayRange,
        filter: CageFilter,
    ) -> Result<Vec<Cage>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {CAGE_COLUMNS} FROM clinic.cage c WHERE "));
        push_no_overlap(&mut query, stay);
        filter.push(&mut query);
        query.push(" ORDER BY c.cage_number");

        Ok(query.build_query_as::<Cage>().fetch_all(self.pool).await?)
    }

    /// Every cage with its current occupant and next upcoming reservation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_with_occupancy(
        &self,
        filter: CageFilter,
        today: NaiveDate,
    ) -> Result<Vec<CageListing>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            r"
            SELECT {CAGE_COLUMNS},
                   pet.name AS current_pet_name,
                   next.check_in_date AS next_check_in,
                   next.check_out_date AS next_check_out
            FROM clinic.cage c
            LEFT JOIN clinic.pet pet ON pet.id = c.current_pet_id
            LEFT JOIN LATERAL (
                SELECT r.check_in_date, r.check_out_date
                FROM clinic.cage_reservation r
                WHERE r.cage_id = c.id
                  AND r.status = 'reserved'
                  AND r.check_out_date >= "
        ));
        query.push_bind(today).push(
            r"
                ORDER BY r.check_in_date
                LIMIT 1
            ) next ON TRUE
            WHERE TRUE",
        );
        filter.push(&mut query);
        query.push(" ORDER BY c.cage_number");

        Ok(query
            .build_query_as::<CageListing>()
            .fetch_all(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CageId) -> Result<Option<Cage>, RepositoryError> {
        let cage = sqlx::query_as::<_, Cage>(&format!(
            "SELECT {CAGE_COLUMNS} FROM clinic.cage c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(cage)
    }

    /// Reservations for a cage, most recent stay first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reservations(&self, id: CageId) -> Result<Vec<CageReservation>, RepositoryError> {
        let reservations = sqlx::query_as::<_, CageReservation>(&format!(
            r"
            SELECT {RESERVATION_COLUMNS}
            FROM clinic.cage_reservation
            WHERE cage_id = $1
            ORDER BY check_in_date DESC
            "
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(reservations)
    }

    /// Insert a cage in `available` status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the cage number is taken.
    pub async fn create(&self, cage: &NewCage) -> Result<Cage, RepositoryError> {
        let id = sqlx::query_scalar::<_, CageId>(
            r"
            INSERT INTO clinic.cage (cage_number, cage_type, capacity, daily_rate, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(&cage.cage_number)
        .bind(cage.cage_type)
        .bind(cage.capacity)
        .bind(cage.daily_rate.amount())
        .bind(cage.notes.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(unique_violation("Cage number already exists"))?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Apply a partial update, rejecting a cage number used by another cage.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cage doesn't exist.
    /// Returns `RepositoryError::Conflict` if the new number is taken.
    pub async fn update(&self, id: CageId, changes: &CageChanges) -> Result<Cage, RepositoryError> {
        if let Some(number) = changes.cage_number.as_deref() {
            let taken = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM clinic.cage WHERE cage_number = $1 AND id <> $2)",
            )
            .bind(number)
            .bind(id)
            .fetch_one(self.pool)
            .await?;
            if taken {
                return Err(RepositoryError::Conflict(
                    "Cage number already exists".to_owned(),
                ));
            }
        }

        let result = sqlx::query(
            r"
            UPDATE clinic.cage
            SET cage_number = COALESCE($2, cage_number),
                cage_type = COALESCE($3, cage_type),
                capacity = COALESCE($4, capacity),
                daily_rate = COALESCE($5, daily_rate),
                status = COALESCE($6, status),
                notes = COALESCE($7, notes),
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(changes.cage_number.as_deref())
        .bind(changes.cage_type)
        .bind(changes.capacity)
        .bind(changes.daily_rate.map(|r| r.amount()))
        .bind(changes.status)
        .bind(changes.notes.as_deref())
        .execute(self.pool)
        .await
        .map_err(unique_violation("Cage number already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a cage unless it is occupied or actively reserved.
    ///
    /// The checks and the delete run in one transaction holding the cage row
    /// lock, so a booking cannot slip in between them.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cage doesn't exist.
    /// Returns `RepositoryError::Conflict` if the cage is occupied or has an
    /// active reservation.
    pub async fn delete(&self, id: CageId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let cage = lock(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        if cage.status == CageStatus::Occupied {
            return Err(RepositoryError::Conflict(
                "Cannot delete an occupied cage".to_owned(),
            ));
        }

        let active = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM clinic.cage_reservation
                WHERE cage_id = $1 AND status IN ('reserved', 'checked_in')
            )
            ",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if active {
            return Err(RepositoryError::Conflict(
                "Cannot delete a cage with active reservations".to_owned(),
            ));
        }

        sqlx::query("DELETE FROM clinic.cage WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Append `NOT EXISTS (active reservation overlapping stay)` for alias `c`.
fn push_no_overlap(query: &mut QueryBuilder<'_, Postgres>, stay: StayRange) {
    query
        .push(
            r"NOT EXISTS (
                SELECT 1 FROM clinic.cage_reservation r
                WHERE r.cage_id = c.id
                  AND r.status IN ('reserved', 'checked_in')
                  AND r.check_in_date <= ",
        )
        .push_bind(stay.check_out())
        .push(" AND ")
        .push_bind(stay.check_in())
        .push(" <= r.check_out_date)");
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Lock a cage row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: CageId) -> Result<Option<Cage>, RepositoryError> {
    let cage = sqlx::query_as::<_, Cage>(&format!(
        "SELECT {CAGE_COLUMNS} FROM clinic.cage c WHERE c.id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(cage)
}

/// Whether an active reservation on `cage` overlaps `stay`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn has_overlapping_reservation(
    conn: &mut PgConnection,
    cage: CageId,
    stay: StayRange,
) -> Result<bool, RepositoryError> {
    let mut query: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("SELECT NOT (");
    push_no_overlap(&mut query, stay);
    query.push(") FROM clinic.cage c WHERE c.id = ").push_bind(cage);

    let overlapping = query
        .build_query_scalar::<bool>()
        .fetch_optional(conn)
        .await?
        .unwrap_or(false);
    Ok(overlapping)
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_reservation(
    conn: &mut PgConnection,
    cage: CageId,
    appointment: AppointmentId,
    stay: StayRange,
) -> Result<ReservationId, RepositoryError> {
    let id = sqlx::query_scalar::<_, ReservationId>(
        r"
        INSERT INTO clinic.cage_reservation (cage_id, appointment_id, check_in_date, check_out_date)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        ",
    )
    .bind(cage)
    .bind(appointment)
    .bind(stay.check_in())
    .bind(stay.check_out())
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Lock the live reservation of an appointment.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_reservation_for(
    conn: &mut PgConnection,
    appointment: AppointmentId,
) -> Result<Option<CageReservation>, RepositoryError> {
    let reservation = sqlx::query_as::<_, CageReservation>(&format!(
        r"
        SELECT {RESERVATION_COLUMNS}
        FROM clinic.cage_reservation
        WHERE appointment_id = $1 AND status <> 'cancelled'
        ORDER BY id DESC
        LIMIT 1
        FOR UPDATE
        "
    ))
    .bind(appointment)
    .fetch_optional(conn)
    .await?;
    Ok(reservation)
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_reservation_status(
    conn: &mut PgConnection,
    id: ReservationId,
    status: ReservationStatus,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE clinic.cage_reservation SET status = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(status)
    .execute(conn)
    .await?;
    Ok(())
}

/// Cancel every active reservation held by an appointment.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn cancel_reservations_for(
    conn: &mut PgConnection,
    appointment: AppointmentId,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE clinic.cage_reservation
        SET status = 'cancelled', updated_at = NOW()
        WHERE appointment_id = $1 AND status IN ('reserved', 'checked_in')
        ",
    )
    .bind(appointment)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Mark a cage occupied by a checked-in pet.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn occupy(
    conn: &mut PgConnection,
    cage: CageId,
    pet: PetId,
    appointment: AppointmentId,
    stay: StayRange,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE clinic.cage
        SET status = 'occupied', current_pet_id = $2, current_appointment_id = $3,
            check_in_date = $4, check_out_date = $5, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(cage)
    .bind(pet)
    .bind(appointment)
    .bind(stay.check_in())
    .bind(stay.check_out())
    .execute(conn)
    .await?;
    Ok(())
}

/// Clear the occupant of a cage held by `appointment`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn release(
    conn: &mut PgConnection,
    cage: CageId,
    appointment: AppointmentId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE clinic.cage
        SET status = 'available', current_pet_id = NULL, current_appointment_id = NULL,
            check_in_date = NULL, check_out_date = NULL, updated_at = NOW()
        WHERE id = $1 AND current_appointment_id = $2
        ",
    )
    .bind(cage)
    .bind(appointment)
    .execute(conn)
    .await?;
    Ok(())
}

/// Daily rate of a locked cage as a validated amount.
///
/// # Errors
///
/// Returns `RepositoryError::DataCorruption` if the stored rate is not positive.
pub fn daily_rate(cage: &Cage) -> Result<DailyRate, RepositoryError> {
    DailyRate::new(cage.daily_rate).map_err(|e| {
        RepositoryError::DataCorruption(format!("cage {} has invalid rate: {e}", cage.id))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stay(a: &str, b: &str) -> StayRange {
        StayRange::new(a.parse().unwrap(), b.parse().unwrap()).unwrap()
    }

    #[test]
    fn test_overlap_predicate_is_inclusive() {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new("");
        push_no_overlap(&mut query, stay("2025-03-12", "2025-03-20"));
        let sql = query.sql();
        assert!(sql.contains("r.check_in_date <= $1 AND $2 <= r.check_out_date"));
        assert!(sql.contains("'reserved', 'checked_in'"));
    }

    #[test]
    fn test_filters_bind_in_order() {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new("WHERE TRUE");
        CageFilter {
            status: Some(CageStatus::Available),
            cage_type: Some(CageType::Large),
        }
        .push(&mut query);
        assert_eq!(query.sql(), "WHERE TRUE AND c.status = $1 AND c.cage_type = $2");
    }
}
