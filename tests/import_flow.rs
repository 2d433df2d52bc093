mod common;

use common::{create_product, create_user, setup_state};
use fulfillment_engine::{
    access::{Actor, roles},
    dto::orders::CreateOrderRequest,
    import::ImportReport,
    order_code,
    services::{import_service, order_service},
    state::AppState,
};
use rust_decimal::Decimal;

const HEADER: &str = "Order Code,Customer Name,Mobile Number,Shipping Address,Product ID/Code,Quantity,Price Per Unit,Product Variant\n";
const FAMILY: &str = "SELECT COUNT(*) FROM orders WHERE (order_code = $1 OR order_code LIKE $1 || '-V%')";

// Integration flow: a supplied code and its variant codes are one family, a
// generated fan-out base is never handed out again, and a failed row carries
// no warnings.
#[tokio::test]
async fn import_code_families_and_row_outcomes() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };

    let state = setup_state(&database_url).await?;

    let seller = create_user(&state.pool, "seller@example.com", roles::SELLER).await?;
    create_product(&state.pool, "SKU-1", "Argan Oil", seller.user_id).await?;

    // A plain order first, then a fan-out reusing its code.
    let report = import(&state, &seller, "#250122002,J,+971501234567,X,SKU-1,1,10,\n").await?;
    assert_eq!(report.success_count, 1, "{:?}", report.errors);
    let report = import(&state, &seller, "#250122002,J,+971501234567,X,SKU-1,2,10,\"Red, Blue\"\n").await?;
    assert_eq!((report.success_count, report.error_count), (0, 1));
    assert_eq!(report.errors[0].row, 2);
    assert!(report.errors[0].reason.contains("#250122002"), "{}", report.errors[0].reason);
    assert_eq!(family(&state, "#250122002").await?, 1);

    // The other way round: variants first, then the bare code.
    let report = import(&state, &seller, "#250122003,J,+971501234567,X,SKU-1,2,10,\"Red, Blue\"\n").await?;
    assert_eq!(report.success_count, 2, "{:?}", report.errors);
    let report = import(&state, &seller, "#250122003,J,+971501234567,X,SKU-1,1,10,\n").await?;
    assert_eq!((report.success_count, report.error_count), (0, 1));
    assert_eq!(family(&state, "#250122003").await?, 2);

    // A generated base is reserved by its variants.
    let report = import(&state, &seller, ",J,+971501234567,X,SKU-1,1,10,\"Red, Blue\"\n").await?;
    assert_eq!(report.success_count, 2, "{:?}", report.errors);
    let base = report.created_order_codes[0]
        .strip_suffix("-V1")
        .expect("variant code")
        .to_string();
    assert!(order_code::is_canonical(&base), "{base}");
    assert_eq!(report.created_order_codes[1], order_code::variant_code(&base, 2));

    let created = order_service::create_order(
        &state,
        &seller,
        CreateOrderRequest {
            customer: "Jane Doe".into(),
            customer_phone: "+971501234567".into(),
            shipping_address: "Villa 1".into(),
            quantity: Some(1),
            price_per_unit: Some(Decimal::from(10)),
            ..CreateOrderRequest::default()
        },
    )
    .await?
    .data
    .expect("order");
    assert!(order_code::is_canonical(&created.order_code));
    assert_ne!(created.order_code, base);
    assert_eq!(family(&state, &base).await?, 2);

    // Unknown product: a warning on the row that lands, none on the row that fails.
    let report = import(
        &state,
        &seller,
        "#250122002,J,+971501234567,X,SKU-404,1,10,\n\
         #250122004,J,+971501234567,X,SKU-404,1,10,\n",
    )
    .await?;
    assert_eq!((report.success_count, report.error_count), (1, 1));
    assert_eq!(report.errors[0].row, 2);
    assert!(!report.warnings.iter().any(|w| w.starts_with("Row 2:")), "{:?}", report.warnings);
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.starts_with("Row 3:") && w.contains("SKU-404")),
        "{:?}",
        report.warnings
    );

    Ok(())
}

async fn import(state: &AppState, actor: &Actor, rows: &str) -> anyhow::Result<ImportReport> {
    let csv = format!("{HEADER}{rows}");
    Ok(import_service::import_orders(state, actor, csv.as_bytes(), None)
        .await?
        .data
        .expect("report"))
}

async fn family(state: &AppState, base: &str) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as(FAMILY).bind(base).fetch_one(&state.pool).await?;
    Ok(count)
}
