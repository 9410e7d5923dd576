mod common;

use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::{test, web};
use chrono::Duration;
use pretty_assertions::assert_eq;
use softwaretest::auth::{Principal, ADMIN_ROLE, APPLICATION_SCHEME};
use softwaretest::build_app;
use softwaretest::state::AppState;

/// Every cookie is old enough to be checked against the store.
async fn always_revalidating() -> web::Data<AppState> {
    let mut plan = common::plan("Production");
    plan.authentication.revalidation_interval = Duration::zero();
    common::app_state_from(plan).await
}

async fn signed_in(state: &web::Data<AppState>, user_id: &str) -> Cookie<'static> {
    let user = state.identity.find_by_id(user_id).await.unwrap().unwrap();
    let roles = state.identity.roles_for(user_id).await.unwrap();
    state
        .cookies
        .sign_in(APPLICATION_SCHEME, &Principal::new(&user, roles), true)
        .unwrap()
}

#[actix_rt::test]
async fn test_rotated_security_stamp_signs_the_cookie_out() {
    let state = always_revalidating().await;
    let user_id = common::confirmed_user(&state.identity, "stamp@example.com").await;
    let cookie = signed_in(&state, &user_id).await;

    let user = state.identity.find_by_id(&user_id).await.unwrap().unwrap();
    state
        .identity
        .store()
        .update_password(&user_id, &user.password_hash, "ROTATED")
        .await
        .unwrap();

    let app = test::init_service(build_app(state)).await;
    let req = test::TestRequest::get()
        .uri("/Account/Manage")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp
        .response()
        .cookies()
        .all(|c| c.name() != APPLICATION_SCHEME));
}

#[actix_rt::test]
async fn test_revalidation_refreshes_roles_and_reissues_cookie() {
    let state = always_revalidating().await;
    let user_id = common::confirmed_user(&state.identity, "promoted@example.com").await;
    let cookie = signed_in(&state, &user_id).await;

    state.identity.ensure_role(ADMIN_ROLE).await.unwrap();
    state.identity.add_to_role(&user_id, ADMIN_ROLE).await.unwrap();

    let app = test::init_service(build_app(state.clone())).await;
    let req = test::TestRequest::get()
        .uri("/Admin/Roles")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let refreshed = resp
        .response()
        .cookies()
        .find(|c| c.name() == APPLICATION_SCHEME)
        .expect("a revalidated cookie should be re-issued")
        .into_owned();
    let ticket = state
        .cookies
        .authenticate(APPLICATION_SCHEME, refreshed.value())
        .unwrap();
    assert_eq!(ticket.principal.roles, vec![ADMIN_ROLE.to_string()]);
    assert!(ticket.persistent);
}

#[actix_rt::test]
async fn test_fresh_cookie_keeps_its_roles_until_revalidated() {
    let state = common::app_state("Production").await;
    let user_id = common::confirmed_user(&state.identity, "later@example.com").await;
    let cookie = signed_in(&state, &user_id).await;

    state.identity.ensure_role(ADMIN_ROLE).await.unwrap();
    state.identity.add_to_role(&user_id, ADMIN_ROLE).await.unwrap();

    let app = test::init_service(build_app(state)).await;
    let req = test::TestRequest::get()
        .uri("/Admin/Roles")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(resp
        .response()
        .cookies()
        .all(|c| c.name() != APPLICATION_SCHEME));
}
