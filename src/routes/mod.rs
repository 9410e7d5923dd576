pub mod account;
pub mod admin;
pub mod diagnostics;
pub mod health;

use actix_web::web;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(diagnostics::error_page)
        .service(
            web::scope("/Account")
                .service(account::register)
                .service(account::confirm_email)
                .service(account::resend_email_confirmation)
                .service(account::login)
                .service(account::logout)
                .service(account::forgot_password)
                .service(account::reset_password)
                .service(account::manage)
                .service(account::change_password),
        )
        .service(
            web::scope("/Admin")
                .service(admin::list_roles)
                .service(admin::create_role)
                .service(admin::get_user)
                .service(admin::add_user_to_role),
        );
}

/// Routes only mapped in the Development environment.
pub fn development(cfg: &mut web::ServiceConfig) {
    cfg.service(diagnostics::apply_migrations);
}
