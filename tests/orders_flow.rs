mod common;

use common::{audit_rows, create_product, create_user, setup_state, status_change};
use fulfillment_engine::{
    access::roles,
    audit::actions,
    dto::orders::CreateOrderRequest,
    error::AppError,
    order_code,
    routes::params::OrderListQuery,
    services::{import_service, order_service, role_service, workflow_service},
    workflow::{OrderStatus, WorkflowStatus},
};
use rust_decimal::Decimal;

// Integration flow: seller creates an order that lands with the only agent,
// the agent cancels it, a CSV row fans out into variant orders, and the
// Super Admin-only gates hold.
#[tokio::test]
async fn order_lifecycle_import_and_gates() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        return Ok(());
    };

    let state = setup_state(&database_url).await?;

    let seller = create_user(&state.pool, "seller@example.com", roles::SELLER).await?;
    let agent = create_user(&state.pool, "agent@example.com", roles::CALL_CENTER_AGENT).await?;
    let owner = create_user(&state.pool, "owner@example.com", roles::SUPER_ADMIN).await?;

    // Create: priced, coded and handed to the only agent.
    let created = order_service::create_order(
        &state,
        &seller,
        CreateOrderRequest {
            customer: "Jane Doe".into(),
            customer_phone: "050 123 4567".into(),
            shipping_address: "Villa 1, Jumeirah".into(),
            quantity: Some(2),
            price_per_unit: Some(Decimal::new(2550, 2)),
            ..CreateOrderRequest::default()
        },
    )
    .await?;
    let order = created.data.expect("order");
    assert!(order_code::is_canonical(&order.order_code), "{}", order.order_code);
    assert_eq!(order.customer_phone, "+971501234567");
    assert_eq!(order.total_price, Decimal::new(5100, 2));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.workflow_status, WorkflowStatus::SellerSubmitted);
    assert_eq!(order.seller_id, Some(seller.user_id));
    assert_eq!(order.agent_id, Some(agent.user_id));

    // Cancel without a reason: refused, nothing written.
    let err = workflow_service::transition_status(
        &state,
        &agent,
        order.id,
        status_change(OrderStatus::Cancelled, Some("")),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "cancelled_reason"));
    assert_eq!(audit_rows(&state.pool, actions::STATUS_CHANGE, order.id).await?, 0);

    let cancelled = workflow_service::transition_status(
        &state,
        &agent,
        order.id,
        status_change(OrderStatus::Cancelled, Some("Customer changed mind")),
    )
    .await?
    .data
    .expect("order");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.workflow_status, WorkflowStatus::Cancelled);
    assert_eq!(cancelled.cancelled_reason, "Customer changed mind");
    assert_eq!(audit_rows(&state.pool, actions::STATUS_CHANGE, order.id).await?, 1);

    let detail = order_service::get_order(&state, &seller, order.id)
        .await?
        .data
        .expect("detail");
    assert_eq!(detail.history.len(), 1);
    assert_eq!(detail.history[0].to_status, OrderStatus::Cancelled.as_str());

    // Import: one row with two variants becomes two orders.
    create_product(&state.pool, "SKU-1", "Argan Oil", seller.user_id).await?;
    let csv = "Order Code,Customer Name,Mobile Number,Shipping Address,Product ID/Code,Quantity,Price Per Unit,Product Variant\n\
               #250122001,J,+971501234567,X,SKU-1,2,10,\"Red, Blue\"\n";
    let report = import_service::import_orders(&state, &seller, csv.as_bytes(), None)
        .await?
        .data
        .expect("report");
    assert_eq!(report.success_count, 2, "{:?}", report.errors);
    assert_eq!(report.error_count, 0);
    assert_eq!(
        report.created_order_codes,
        vec!["#250122001-V1".to_string(), "#250122001-V2".to_string()]
    );

    let imported = order_service::list_orders(
        &state,
        &seller,
        OrderListQuery {
            q: Some("#250122001-V".into()),
            ..OrderListQuery::default()
        },
    )
    .await?
    .data
    .expect("orders")
    .items;
    assert_eq!(imported.len(), 2);
    for variant in ["Red", "Blue"] {
        let found = imported
            .iter()
            .find(|o| o.notes.contains(&format!("Product Variant: {variant}")))
            .expect("variant order");
        assert_eq!(found.quantity, 2);
        assert_eq!(found.total_price, Decimal::from(20));
        assert_eq!(found.seller_id, Some(seller.user_id));
    }

    // Re-importing the same code is a row error, not a failure.
    let again = import_service::import_orders(&state, &seller, csv.as_bytes(), None)
        .await?
        .data
        .expect("report");
    assert_eq!(again.success_count, 0);
    assert_eq!(again.error_count, 1);

    // Sellers delete pending orders only.
    let v1 = imported
        .iter()
        .find(|o| o.order_code.ends_with("-V1"))
        .expect("v1");
    let v2 = imported
        .iter()
        .find(|o| o.order_code.ends_with("-V2"))
        .expect("v2");
    workflow_service::transition_status(&state, &agent, v2.id, status_change(OrderStatus::Confirmed, None))
        .await?;
    let err = order_service::delete_order(&state, &seller, v2.id).await.unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied { ref capability } if capability == "delete_order"));
    order_service::delete_order(&state, &seller, v1.id).await?;

    // Export belongs to Super Admin.
    let err = order_service::export_orders(&state, &seller, OrderListQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied { ref capability } if capability == "export_data"));
    let body = order_service::export_orders(&state, &owner, OrderListQuery::default()).await?;
    let mut lines = body.lines();
    assert_eq!(lines.next(), Some(order_service::EXPORT_HEADERS.join(",").as_str()));
    assert_eq!(lines.count(), 2);

    // Default roles stay.
    let seller_role = role_service::find_role_by_name(&state.orm, roles::SELLER).await?;
    let err = role_service::delete_role(&state, &owner, seller_role.id).await.unwrap_err();
    assert!(matches!(err, AppError::ProtectedRole(_)));
    role_service::find_role_by_name(&state.orm, roles::SELLER).await?;

    Ok(())
}
