//! Deterministic demo data for local development and tests.
//!
//! The dataset uses fixed ids so that loading it twice is a no-op: every
//! insert is `ON CONFLICT DO NOTHING`, and the returned summary always
//! points at the same rows.

use chrono::Utc;
use uuid::{uuid, Uuid};

use cotizador_core::domain::client::ClientId;
use cotizador_core::domain::company::CompanyId;
use cotizador_core::domain::product::ProductId;
use cotizador_core::domain::user::UserId;

use crate::DbPool;

const DEMO_COMPANY_ID: Uuid = uuid!("0190c1a0-0000-7000-8000-000000000001");
const DEMO_ADMIN_ID: Uuid = uuid!("0190c1a0-0000-7000-8000-000000000011");
const DEMO_SELLER_ID: Uuid = uuid!("0190c1a0-0000-7000-8000-000000000012");
const DEMO_CLIENT_IDS: [Uuid; 2] = [
    uuid!("0190c1a0-0000-7000-8000-000000000021"),
    uuid!("0190c1a0-0000-7000-8000-000000000022"),
];
const DEMO_PRODUCT_IDS: [Uuid; 3] = [
    uuid!("0190c1a0-0000-7000-8000-000000000031"),
    uuid!("0190c1a0-0000-7000-8000-000000000032"),
    uuid!("0190c1a0-0000-7000-8000-000000000033"),
];

const DEMO_CLIENT_NAMES: [&str; 2] = ["Constructora Andes Ltda", "Ferretería El Puente"];

/// Ids of the rows a seed run guarantees to exist.
#[derive(Clone, Debug)]
pub struct SeedSummary {
    pub company_id: CompanyId,
    pub admin_id: UserId,
    pub seller_id: UserId,
    pub client_ids: [ClientId; 2],
    pub product_ids: [ProductId; 3],
}

impl SeedSummary {
    pub fn client_name(&self, index: usize) -> &'static str {
        DEMO_CLIENT_NAMES[index]
    }
}

pub struct DemoDataset;

impl DemoDataset {
    /// Insert the demo tenant: one company, an admin and a seller, two
    /// clients, three products. Safe to call repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedSummary, sqlx::Error> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO company (id, name, created_at) VALUES (?, ?, ?)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(DEMO_COMPANY_ID.to_string())
        .bind("Cotizador Demo SpA")
        .bind(&now)
        .execute(pool)
        .await?;

        for (id, name, email, role) in [
            (DEMO_ADMIN_ID, "Marcela Rojas", "marcela@demo.cotizador.cl", "admin"),
            (DEMO_SELLER_ID, "Diego Fuentes", "diego@demo.cotizador.cl", "seller"),
        ] {
            sqlx::query(
                "INSERT INTO app_user (id, company_id, name, email, role, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(id.to_string())
            .bind(DEMO_COMPANY_ID.to_string())
            .bind(name)
            .bind(email)
            .bind(role)
            .bind(&now)
            .execute(pool)
            .await?;
        }

        for (id, name, email, phone, tax_id) in [
            (
                DEMO_CLIENT_IDS[0],
                DEMO_CLIENT_NAMES[0],
                "compras@andes.cl",
                Some("+56 2 2345 6789"),
                Some("76.123.456-7"),
            ),
            (DEMO_CLIENT_IDS[1], DEMO_CLIENT_NAMES[1], "ventas@elpuente.cl", None, None),
        ] {
            sqlx::query(
                "INSERT INTO client (id, company_id, name, email, phone, tax_id, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(id.to_string())
            .bind(DEMO_COMPANY_ID.to_string())
            .bind(name)
            .bind(email)
            .bind(phone)
            .bind(tax_id)
            .bind(&now)
            .execute(pool)
            .await?;
        }

        for (id, name, sku, price) in [
            (DEMO_PRODUCT_IDS[0], "Servicio de instalación", "SRV-INST", "100"),
            (DEMO_PRODUCT_IDS[1], "Visita técnica", "SRV-VISITA", "50"),
            (DEMO_PRODUCT_IDS[2], "Hora de soporte", "SRV-SOPORTE", "25"),
        ] {
            sqlx::query(
                "INSERT INTO product (id, company_id, name, sku, price, tax_percentage, created_at)
                 VALUES (?, ?, ?, ?, ?, '19', ?)
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(id.to_string())
            .bind(DEMO_COMPANY_ID.to_string())
            .bind(name)
            .bind(sku)
            .bind(price)
            .bind(&now)
            .execute(pool)
            .await?;
        }

        Ok(SeedSummary {
            company_id: CompanyId(DEMO_COMPANY_ID),
            admin_id: UserId(DEMO_ADMIN_ID),
            seller_id: UserId(DEMO_SELLER_ID),
            client_ids: DEMO_CLIENT_IDS.map(ClientId),
            product_ids: DEMO_PRODUCT_IDS.map(ProductId),
        })
    }
}

/// Seed a second tenant with fresh random ids. Used by tests that need
/// to prove cross-tenant isolation.
pub async fn seed_company(pool: &DbPool, name: &str) -> Result<SeedSummary, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let company_id = Uuid::new_v4();
    let admin_id = Uuid::new_v4();
    let seller_id = Uuid::new_v4();
    let client_ids = [Uuid::new_v4(), Uuid::new_v4()];
    let product_ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];

    sqlx::query("INSERT INTO company (id, name, created_at) VALUES (?, ?, ?)")
        .bind(company_id.to_string())
        .bind(name)
        .bind(&now)
        .execute(pool)
        .await?;

    for (id, user_name, role) in
        [(admin_id, "Admin", "admin"), (seller_id, "Vendedor", "seller")]
    {
        sqlx::query(
            "INSERT INTO app_user (id, company_id, name, email, role, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(company_id.to_string())
        .bind(user_name)
        .bind(format!("{role}-{id}@example.com"))
        .bind(role)
        .bind(&now)
        .execute(pool)
        .await?;
    }

    for (index, id) in client_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO client (id, company_id, name, email, phone, tax_id, created_at)
             VALUES (?, ?, ?, ?, NULL, NULL, ?)",
        )
        .bind(id.to_string())
        .bind(company_id.to_string())
        .bind(format!("Cliente {}", index + 1))
        .bind(format!("cliente-{id}@example.com"))
        .bind(&now)
        .execute(pool)
        .await?;
    }

    for (index, id) in product_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO product (id, company_id, name, sku, price, tax_percentage, created_at)
             VALUES (?, ?, ?, ?, '10', '19', ?)",
        )
        .bind(id.to_string())
        .bind(company_id.to_string())
        .bind(format!("Producto {}", index + 1))
        .bind(format!("SKU-{}", index + 1))
        .bind(&now)
        .execute(pool)
        .await?;
    }

    Ok(SeedSummary {
        company_id: CompanyId(company_id),
        admin_id: UserId(admin_id),
        seller_id: UserId(seller_id),
        client_ids: client_ids.map(ClientId),
        product_ids: product_ids.map(ProductId),
    })
}

#[cfg(test)]
mod tests {
    use cotizador_core::config::DatabaseConfig;

    use super::DemoDataset;
    use crate::{connect, migrations};

    #[tokio::test]
    async fn loading_twice_is_idempotent() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 30,
        };
        let pool = connect(&config).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        DemoDataset::load(&pool).await.expect("first load");
        DemoDataset::load(&pool).await.expect("second load");

        let companies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM company")
            .fetch_one(&pool)
            .await
            .expect("count companies");
        let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product")
            .fetch_one(&pool)
            .await
            .expect("count products");

        assert_eq!(companies, 1);
        assert_eq!(products, 3);
    }
}
