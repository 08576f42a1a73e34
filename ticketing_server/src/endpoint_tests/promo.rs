use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use ticketing_engine::{
    db_types::{DiscountType, PromoCode},
    traits::{PromoResync, PromoUsageStats},
    PromoLedgerApi,
};
use tkt_common::Paise;

use super::{
    helpers::{json_body, send, timestamp},
    mocks::MockTicketingBackend,
};
use crate::routes::{PromoAnalyticsRoute, PromoQuoteRoute, PromoResyncRoute};

fn festival_promo(current_uses: i64) -> PromoCode {
    PromoCode {
        id: 4,
        code: "MONSOON10".into(),
        event_id: 1,
        discount_type: DiscountType::Percentage,
        discount_value: 1000,
        valid_from: None,
        valid_until: None,
        max_uses: 50,
        current_uses,
        is_active: true,
        created_at: timestamp(),
    }
}

fn configure(cfg: &mut ServiceConfig) {
    let mut backend = MockTicketingBackend::new();
    backend.expect_fetch_promo_code().returning(|code, event_id| match (code, event_id) {
        ("MONSOON10", Some(1)) => Ok(Some(festival_promo(12))),
        ("SOLDOUT", Some(1)) => Ok(Some(PromoCode { code: "SOLDOUT".into(), ..festival_promo(50) })),
        _ => Ok(None),
    });
    backend.expect_fetch_promo_code_by_id().returning(|id| Ok((id == 4).then(|| festival_promo(12))));
    backend.expect_promo_usage_stats().returning(|_| {
        Ok(PromoUsageStats {
            uses: 10,
            tickets_booked: 25,
            amount_saved: Paise::from(125_000),
            revenue: Paise::from(1_125_000),
        })
    });
    backend.expect_recompute_current_uses().withf(|id| id.is_none()).returning(|_| {
        Ok(vec![PromoResync { promo_id: 4, code: "MONSOON10".into(), previous_uses: 12, current_uses: 10 }])
    });
    let api = PromoLedgerApi::new(backend);
    // The resync route must be registered ahead of the `{code}` route
    cfg.service(PromoResyncRoute::<MockTicketingBackend>::new())
        .service(PromoAnalyticsRoute::<MockTicketingBackend>::new())
        .service(PromoQuoteRoute::<MockTicketingBackend>::new())
        .app_data(web::Data::new(api));
}

#[actix_web::test]
async fn quote_a_valid_code() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/promo/MONSOON10?event_id=1&subtotal=100000");
    let (status, body) = send(req, configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let quote = json_body(&body);
    assert_eq!(quote["status"], "valid");
    assert_eq!(quote["discount"], 10_000);
    assert_eq!(quote["total"], 90_000);
}

#[actix_web::test]
async fn quote_rejections_explain_themselves() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/promo/SOLDOUT?event_id=1&subtotal=100000");
    let (status, body) = send(req, configure).await;
    assert_eq!(status, StatusCode::OK);
    let quote = json_body(&body);
    assert_eq!(quote["status"], "rejected");
    assert_eq!(quote["reason"], "usage_limit_reached");
    assert_eq!(quote["max_uses"], 50);

    // A code belonging to another event is unknown here
    let req = TestRequest::get().uri("/promo/MONSOON10?event_id=2&subtotal=100000");
    let (_, body) = send(req, configure).await;
    assert_eq!(json_body(&body)["reason"], "unknown");
}

#[actix_web::test]
async fn quote_needs_event_and_subtotal() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/promo/MONSOON10?event_id=1");
    let (status, _) = send(req, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn analytics_for_a_code() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send(TestRequest::get().uri("/promo/4/analytics"), configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let analytics = json_body(&body);
    assert_eq!(analytics["code"], "MONSOON10");
    assert_eq!(analytics["uses"], 10);
    assert_eq!(analytics["average_order_value"], 112_500);
    assert_eq!(analytics["redemption_rate"], 20.0);

    let (status, _) = send(TestRequest::get().uri("/promo/99/analytics"), configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn resync_reports_corrected_counters() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send(TestRequest::post().uri("/promo/resync"), configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let fixed = json_body(&body);
    assert_eq!(fixed[0]["previous_uses"], 12);
    assert_eq!(fixed[0]["current_uses"], 10);
}
