use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use super::*;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, phone, created_at";

// Boardings are always aliased `b` so the same list works in joins.
const BOARDING_COLUMNS: &str = "b.id, b.owner_id, b.title, b.description, b.boarding_type, b.university, \
     b.town, b.price, b.bedrooms, b.bathrooms, b.facilities, b.contact_phone, b.is_approved, b.created_at";

const SERVICE_SELECT: &str = "SELECT s.id, s.provider_id, s.service_type, s.university, s.town, s.name, \
     s.contact_number, s.description, s.image, s.is_approved, s.created_at, u.name AS provider_name \
     FROM services s LEFT JOIN users u ON u.id = s.provider_id";

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[derive(Clone)]
pub struct PgRepo {
    pool: PgPool,
}

impl PgRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(d) if d.is_unique_violation() => RepoError::Conflict,
        sqlx::Error::Database(d) if d.is_foreign_key_violation() => RepoError::NotFound,
        _ => RepoError::Unavailable(e.to_string()),
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Id,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    phone: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepoError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role = r.role.parse().map_err(|e| RepoError::Internal(format!("user {}: {e}", r.id)))?;
        Ok(User {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            role,
            phone: r.phone,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct BoardingRow {
    id: Id,
    owner_id: Id,
    title: String,
    description: String,
    boarding_type: String,
    university: String,
    town: String,
    price: f64,
    bedrooms: i32,
    bathrooms: i32,
    facilities: String,
    contact_phone: String,
    is_approved: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<BoardingRow> for Boarding {
    type Error = RepoError;

    fn try_from(r: BoardingRow) -> Result<Self, Self::Error> {
        let kind = r.boarding_type.parse().map_err(|e| RepoError::Internal(format!("boarding {}: {e}", r.id)))?;
        let facilities = serde_json::from_str(&r.facilities).unwrap_or_else(|e| {
            tracing::warn!(boarding_id = r.id, "unreadable facilities column: {e}");
            Vec::new()
        });
        Ok(Boarding {
            id: r.id,
            owner_id: r.owner_id,
            title: r.title,
            description: r.description,
            kind,
            university: r.university,
            town: r.town,
            price: r.price,
            bedrooms: r.bedrooms,
            bathrooms: r.bathrooms,
            facilities,
            contact_phone: r.contact_phone,
            is_approved: r.is_approved,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct FavoriteRow {
    #[sqlx(flatten)]
    boarding: BoardingRow,
    favorited_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ServiceRow {
    id: Id,
    provider_id: Id,
    service_type: String,
    university: String,
    town: String,
    name: String,
    contact_number: String,
    description: String,
    image: Option<String>,
    is_approved: bool,
    created_at: DateTime<Utc>,
    provider_name: Option<String>,
}

impl From<ServiceRow> for Service {
    fn from(r: ServiceRow) -> Self {
        Service {
            id: r.id,
            provider_id: r.provider_id,
            service_type: r.service_type,
            university: r.university,
            town: r.town,
            name: r.name,
            contact_number: r.contact_number,
            description: r.description,
            image: r.image,
            is_approved: r.is_approved,
            created_at: r.created_at,
            provider_name: r.provider_name,
        }
    }
}

fn boardings(rows: Vec<BoardingRow>) -> RepoResult<Vec<Boarding>> {
    rows.into_iter().map(Boarding::try_from).collect()
}

fn facilities_json(facilities: &[String]) -> RepoResult<String> {
    serde_json::to_string(facilities).map_err(|e| RepoError::Internal(e.to_string()))
}

#[async_trait]
impl UserRepo for PgRepo {
    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (name, email, password_hash, role, phone) VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(&new.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        row.try_into()
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(User::try_from).transpose()
    }

    async fn get_user(&self, id: Id) -> RepoResult<User> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .try_into()
    }

    async fn list_users(&self, query: &UserQuery) -> RepoResult<Vec<User>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users WHERE TRUE"));
        if let Some(search) = &query.search {
            let pattern = crate::search::contains_pattern(search);
            qb.push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(role) = query.role {
            qb.push(" AND role = ").push_bind(role.as_str());
        }
        qb.push(" ORDER BY created_at DESC, id DESC");
        let rows = qb.build_query_as::<UserRow>().fetch_all(&self.pool).await.map_err(db_err)?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn delete_user(&self, id: Id) -> RepoResult<Vec<String>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut released: Vec<String> = sqlx::query_scalar(
            "SELECT i.image_name FROM boarding_images i JOIN boardings b ON b.id = i.boarding_id \
             WHERE b.owner_id = $1 ORDER BY i.id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;
        let service_images: Vec<String> =
            sqlx::query_scalar("SELECT image FROM services WHERE provider_id = $1 AND image IS NOT NULL")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err)?;
        released.extend(service_images);
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if deleted.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        tx.commit().await.map_err(db_err)?;
        Ok(released)
    }
}

#[async_trait]
impl BoardingRepo for PgRepo {
    async fn create_boarding(&self, owner_id: Id, input: BoardingInput, approved: bool) -> RepoResult<Boarding> {
        let row = sqlx::query_as::<_, BoardingRow>(&format!(
            "INSERT INTO boardings AS b (owner_id, title, description, boarding_type, university, town, price, \
             bedrooms, bathrooms, facilities, contact_phone, is_approved) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {BOARDING_COLUMNS}"
        ))
        .bind(owner_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.kind.as_str())
        .bind(&input.university)
        .bind(&input.town)
        .bind(input.price)
        .bind(input.bedrooms)
        .bind(input.bathrooms)
        .bind(facilities_json(&input.facilities)?)
        .bind(&input.contact_phone)
        .bind(approved)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        row.try_into()
    }

    async fn get_boarding(&self, id: Id) -> RepoResult<Boarding> {
        sqlx::query_as::<_, BoardingRow>(&format!("SELECT {BOARDING_COLUMNS} FROM boardings b WHERE b.id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .try_into()
    }

    async fn search_boardings(&self, search: &BoardingSearch) -> RepoResult<Vec<Boarding>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {BOARDING_COLUMNS} FROM boardings b WHERE TRUE"));
        search.push_sql(&mut qb);
        let rows = qb.build_query_as::<BoardingRow>().fetch_all(&self.pool).await.map_err(db_err)?;
        boardings(rows)
    }

    async fn list_boardings_by_owner(&self, owner_id: Id) -> RepoResult<Vec<Boarding>> {
        let rows = sqlx::query_as::<_, BoardingRow>(&format!(
            "SELECT {BOARDING_COLUMNS} FROM boardings b WHERE b.owner_id = $1 ORDER BY b.created_at DESC, b.id DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        boardings(rows)
    }

    async fn owner_stats(&self, owner_id: Id) -> RepoResult<OwnerStats> {
        let (total_boardings, total_rooms, total_income, total_bathrooms) =
            sqlx::query_as::<_, (i64, i64, f64, i64)>(
                "SELECT COUNT(*)::bigint, COALESCE(SUM(bedrooms), 0)::bigint, \
                 COALESCE(SUM(price), 0)::float8, COALESCE(SUM(bathrooms), 0)::bigint \
                 FROM boardings WHERE owner_id = $1",
            )
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(OwnerStats { total_boardings, total_rooms, total_income, total_bathrooms })
    }

    async fn boarding_images(&self, id: Id) -> RepoResult<Vec<String>> {
        sqlx::query_scalar("SELECT image_name FROM boarding_images WHERE boarding_id = $1 ORDER BY id")
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn images_for_boardings(&self, ids: &[Id]) -> RepoResult<HashMap<Id, Vec<String>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, (Id, String)>(
            "SELECT boarding_id, image_name FROM boarding_images WHERE boarding_id = ANY($1) ORDER BY id",
        )
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        let mut out: HashMap<Id, Vec<String>> = HashMap::new();
        for (boarding_id, name) in rows {
            out.entry(boarding_id).or_default().push(name);
        }
        Ok(out)
    }

    async fn add_boarding_image(&self, id: Id, image_name: &str) -> RepoResult<()> {
        sqlx::query("INSERT INTO boarding_images (boarding_id, image_name) VALUES ($1, $2)")
            .bind(id)
            .bind(image_name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_boarding(&self, id: Id, input: BoardingInput) -> RepoResult<Boarding> {
        sqlx::query_as::<_, BoardingRow>(&format!(
            "UPDATE boardings AS b SET title = $2, description = $3, boarding_type = $4, university = $5, \
             town = $6, price = $7, bedrooms = $8, bathrooms = $9, facilities = $10, contact_phone = $11 \
             WHERE b.id = $1 RETURNING {BOARDING_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.kind.as_str())
        .bind(&input.university)
        .bind(&input.town)
        .bind(input.price)
        .bind(input.bedrooms)
        .bind(input.bathrooms)
        .bind(facilities_json(&input.facilities)?)
        .bind(&input.contact_phone)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?
        .try_into()
    }

    async fn delete_boarding(&self, id: Id) -> RepoResult<Vec<String>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let released: Vec<String> =
            sqlx::query_scalar("SELECT image_name FROM boarding_images WHERE boarding_id = $1 ORDER BY id")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err)?;
        let deleted = sqlx::query("DELETE FROM boardings WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if deleted.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        tx.commit().await.map_err(db_err)?;
        Ok(released)
    }

    async fn is_boarding_owner(&self, id: Id, user_id: Id) -> RepoResult<bool> {
        let owner: Id = sqlx::query_scalar("SELECT owner_id FROM boardings WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(owner == user_id)
    }

    async fn set_boarding_approval(&self, id: Id, approved: bool) -> RepoResult<Boarding> {
        sqlx::query_as::<_, BoardingRow>(&format!(
            "UPDATE boardings AS b SET is_approved = $2 WHERE b.id = $1 RETURNING {BOARDING_COLUMNS}"
        ))
        .bind(id)
        .bind(approved)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?
        .try_into()
    }
}

#[async_trait]
impl ServiceRepo for PgRepo {
    async fn create_service(&self, provider_id: Id, input: ServiceInput, approved: bool) -> RepoResult<Service> {
        let id: Id = sqlx::query_scalar(
            "INSERT INTO services (provider_id, service_type, university, town, name, contact_number, \
             description, is_approved) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(provider_id)
        .bind(&input.service_type)
        .bind(&input.university)
        .bind(&input.town)
        .bind(&input.name)
        .bind(&input.contact_number)
        .bind(&input.description)
        .bind(approved)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        self.get_service(id).await
    }

    async fn list_services(&self, approved_only: bool) -> RepoResult<Vec<Service>> {
        let rows = sqlx::query_as::<_, ServiceRow>(&format!(
            "{SERVICE_SELECT} WHERE ($1 = FALSE OR s.is_approved) ORDER BY s.created_at DESC, s.id DESC"
        ))
        .bind(approved_only)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Service::from).collect())
    }

    async fn get_service(&self, id: Id) -> RepoResult<Service> {
        sqlx::query_as::<_, ServiceRow>(&format!("{SERVICE_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map(Service::from)
            .map_err(db_err)
    }

    async fn list_services_by_provider(&self, provider_id: Id) -> RepoResult<Vec<Service>> {
        let rows = sqlx::query_as::<_, ServiceRow>(&format!(
            "{SERVICE_SELECT} WHERE s.provider_id = $1 ORDER BY s.created_at DESC, s.id DESC"
        ))
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Service::from).collect())
    }

    async fn update_service(&self, id: Id, input: ServiceInput) -> RepoResult<Service> {
        let updated = sqlx::query(
            "UPDATE services SET service_type = $2, university = $3, town = $4, name = $5, \
             contact_number = $6, description = $7 WHERE id = $1",
        )
        .bind(id)
        .bind(&input.service_type)
        .bind(&input.university)
        .bind(&input.town)
        .bind(&input.name)
        .bind(&input.contact_number)
        .bind(&input.description)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if updated.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        self.get_service(id).await
    }

    async fn delete_service(&self, id: Id) -> RepoResult<Option<String>> {
        let image: Option<String> = sqlx::query_scalar("DELETE FROM services WHERE id = $1 RETURNING image")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(image)
    }

    async fn is_service_provider(&self, id: Id, user_id: Id) -> RepoResult<bool> {
        let provider: Id = sqlx::query_scalar("SELECT provider_id FROM services WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(provider == user_id)
    }

    async fn set_service_image(&self, id: Id, image_name: &str) -> RepoResult<Option<String>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let previous: Option<String> = sqlx::query_scalar("SELECT image FROM services WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("UPDATE services SET image = $2 WHERE id = $1")
            .bind(id)
            .bind(image_name)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(previous)
    }

    async fn set_service_approval(&self, id: Id, approved: bool) -> RepoResult<Service> {
        let updated = sqlx::query("UPDATE services SET is_approved = $2 WHERE id = $1")
            .bind(id)
            .bind(approved)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if updated.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        self.get_service(id).await
    }
}

#[async_trait]
impl FavoriteRepo for PgRepo {
    async fn add_favorite(&self, user_id: Id, boarding_id: Id) -> RepoResult<bool> {
        let inserted = sqlx::query(
            "INSERT INTO favorites (user_id, boarding_id) VALUES ($1, $2) ON CONFLICT (user_id, boarding_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(boarding_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(inserted.rows_affected() == 1)
    }

    async fn remove_favorite(&self, user_id: Id, boarding_id: Id) -> RepoResult<bool> {
        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND boarding_id = $2")
            .bind(user_id)
            .bind(boarding_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(removed.rows_affected() > 0)
    }

    async fn list_favorites(&self, user_id: Id) -> RepoResult<Vec<FavoriteBoarding>> {
        let rows = sqlx::query_as::<_, FavoriteRow>(&format!(
            "SELECT {BOARDING_COLUMNS}, f.created_at AS favorited_at FROM favorites f \
             JOIN boardings b ON b.id = f.boarding_id WHERE f.user_id = $1 \
             ORDER BY f.created_at DESC, b.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter()
            .map(|r| -> RepoResult<FavoriteBoarding> {
                Ok(FavoriteBoarding { boarding: r.boarding.try_into()?, favorited_at: r.favorited_at, images: Vec::new() })
            })
            .collect()
    }

    async fn is_favorite(&self, user_id: Id, boarding_id: Id) -> RepoResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM favorites WHERE user_id = $1 AND boarding_id = $2)")
            .bind(user_id)
            .bind(boarding_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }
}
