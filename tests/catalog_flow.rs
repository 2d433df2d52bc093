mod common;

use common::{count, create_product, create_user, insert_item, insert_order, setup_state_with_events};
use fulfillment_engine::{
    access::{Actor, roles},
    dto::products::{
        CreateProductRequest, DeletionDecision, DeletionRequestPayload, ResolveDeletionRequest,
        UpdateProductRequest,
    },
    error::AppError,
    notify::{NotificationEvent, NotificationKind},
    services::{product_service, user_service},
};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

// Integration flow: a seller's product waits for review, a seller edit sends
// it back, an approved deletion request removes it, a product still on order
// items stays, and every step reaches the right people.
#[tokio::test]
async fn product_review_deletion_and_notifications() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };

    let (state, mut events) = setup_state_with_events(&database_url).await?;

    let owner = create_user(&state.pool, "owner@example.com", roles::SUPER_ADMIN).await?;
    let admin = create_user(&state.pool, "admin@example.com", roles::ADMIN).await?;
    let seller = create_user(&state.pool, "seller@example.com", roles::SELLER).await?;
    let admins = sorted(vec![owner.user_id, admin.user_id]);

    // Seller listings start unapproved and go to every admin.
    let product = product_service::create_product(&state, &seller, new_product("Argan Oil"))
        .await?
        .data
        .expect("product");
    assert!(!product.is_approved);
    assert_eq!(product.seller_id, seller.user_id);
    let sent = drain(&mut events);
    assert_eq!(recipients(&sent), admins);
    assert!(sent.iter().all(|e| e.kind == NotificationKind::ProductPendingApproval));

    let err = product_service::approve_product(&state, &seller, product.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied { .. }));

    let approved = product_service::approve_product(&state, &admin, product.id)
        .await?
        .data
        .expect("product");
    assert!(approved.is_approved);
    assert_eq!(approved.approved_by, Some(admin.user_id));
    let sent = drain(&mut events);
    assert_eq!(recipients(&sent), vec![seller.user_id]);
    assert_eq!(sent[0].kind, NotificationKind::ProductApproved);

    // A seller edit reverts approval; an admin edit does not.
    let edited = product_service::update_product(
        &state,
        &seller,
        product.id,
        UpdateProductRequest {
            selling_price: Some(Decimal::new(4500, 2)),
            ..UpdateProductRequest::default()
        },
    )
    .await?
    .data
    .expect("product");
    assert!(!edited.is_approved);
    assert_eq!(edited.approved_by, None);
    assert_eq!(edited.code, product.code);
    assert_eq!(recipients(&drain(&mut events)), admins);

    product_service::approve_product(&state, &admin, product.id).await?;
    let kept = product_service::update_product(
        &state,
        &admin,
        product.id,
        UpdateProductRequest {
            stock_quantity: Some(12),
            ..UpdateProductRequest::default()
        },
    )
    .await?
    .data
    .expect("product");
    assert!(kept.is_approved);
    drain(&mut events);

    // Approved deletion removes the product and tells the seller.
    let request = product_service::request_deletion(
        &state,
        &seller,
        product.id,
        DeletionRequestPayload {
            reason: "Discontinued".into(),
        },
    )
    .await?
    .data
    .expect("request");
    assert_eq!(recipients(&drain(&mut events)), admins);

    let err = product_service::request_deletion(
        &state,
        &seller,
        product.id,
        DeletionRequestPayload {
            reason: "Again".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let resolved = product_service::resolve_deletion(
        &state,
        &admin,
        request.id,
        resolution(DeletionDecision::Approved),
    )
    .await?
    .data
    .expect("request");
    assert_eq!(resolved.status, "approved");
    assert_eq!(
        count(&state.pool, "SELECT COUNT(*) FROM products WHERE id = $1", product.id).await?,
        0
    );
    let sent = drain(&mut events);
    assert_eq!(recipients(&sent), vec![seller.user_id]);
    assert_eq!(sent[0].kind, NotificationKind::ProductDeleted);

    // A product on order items cannot be deleted; the request stays open.
    let stocked = create_product(&state.pool, "SKU-STOCK", "Rose Water", seller.user_id).await?;
    let order_id = insert_order(&state.pool, "#ITEM-01", Some(seller.user_id)).await?;
    insert_item(&state.pool, order_id, stocked).await?;
    let request = product_service::request_deletion(
        &state,
        &seller,
        stocked,
        DeletionRequestPayload {
            reason: "Discontinued".into(),
        },
    )
    .await?
    .data
    .expect("request");
    let err = product_service::resolve_deletion(
        &state,
        &admin,
        request.id,
        resolution(DeletionDecision::Approved),
    )
    .await
    .unwrap_err();
    assert!(
        matches!(err, AppError::Conflict(ref message) if message.contains("SKU-STOCK") && message.contains("order items")),
        "{err}"
    );
    assert_eq!(
        count(
            &state.pool,
            "SELECT COUNT(*) FROM product_deletion_requests WHERE id = $1 AND status = 'pending'",
            request.id
        )
        .await?,
        1
    );

    // Deleting the seller would cascade into that product: a typed conflict.
    let err = user_service::delete_user(&state, &owner, seller.user_id)
        .await
        .unwrap_err();
    assert!(
        matches!(err, AppError::Conflict(ref message) if !message.contains("violates")),
        "{err}"
    );
    assert_eq!(
        count(&state.pool, "SELECT COUNT(*) FROM products WHERE id = $1", stocked).await?,
        1
    );
    drain(&mut events);

    // A seller who is also an admin hears nothing as seller, and never from
    // their own request.
    let hybrid = create_user(&state.pool, "hybrid@example.com", roles::SELLER).await?;
    sqlx::query(
        "INSERT INTO user_roles (id, user_id, role_id, is_primary) \
         SELECT $1, $2, r.id, FALSE FROM roles r WHERE r.name = $3",
    )
    .bind(Uuid::new_v4())
    .bind(hybrid.user_id)
    .bind(roles::ADMIN)
    .execute(&state.pool)
    .await?;
    let mut hybrid_actor = Actor::new(hybrid.user_id, &[roles::SELLER, roles::ADMIN]);
    hybrid_actor.email = hybrid.email.clone();

    let own = create_product(&state.pool, "SKU-OWN", "Oud", hybrid.user_id).await?;
    let request = product_service::request_deletion(
        &state,
        &hybrid_actor,
        own,
        DeletionRequestPayload {
            reason: "Duplicate".into(),
        },
    )
    .await?
    .data
    .expect("request");
    assert_eq!(recipients(&drain(&mut events)), admins);

    product_service::resolve_deletion(
        &state,
        &admin,
        request.id,
        resolution(DeletionDecision::Rejected),
    )
    .await?;
    assert!(drain(&mut events).is_empty());

    Ok(())
}

fn new_product(name: &str) -> CreateProductRequest {
    CreateProductRequest {
        name_en: name.to_string(),
        name_ar: String::new(),
        category: Some("Beauty".into()),
        description: None,
        product_variant: None,
        selling_price: Decimal::new(3999, 2),
        purchase_price: Some(Decimal::from(20)),
        stock_quantity: 5,
        image_handle: None,
        product_link: None,
        warehouse_id: None,
        seller_id: None,
    }
}

fn resolution(decision: DeletionDecision) -> ResolveDeletionRequest {
    ResolveDeletionRequest {
        decision,
        admin_notes: Some("Checked".into()),
    }
}

fn drain(events: &mut mpsc::Receiver<NotificationEvent>) -> Vec<NotificationEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn recipients(events: &[NotificationEvent]) -> Vec<Uuid> {
    sorted(events.iter().map(|e| e.recipient_user_id).collect())
}

fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids
}
