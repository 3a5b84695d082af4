use actix_web::{web, HttpResponse, Scope};
use log::{info, warn};
use shared::{Message, Token, UserCreate, UserRead};

use crate::error::ApiError;
use crate::users::repository::{RepositoryError, User, UserRepository};

use super::jwt::JwtService;
use super::middleware::{AuthMiddleware, AuthenticatedUser};
use super::models::LoginForm;
use super::password::{hash_password, verify_password};

pub fn scope(auth_middleware: AuthMiddleware) -> Scope {
    web::scope("/user")
        .route("/create", web::post().to(create_user))
        .route("/login", web::post().to(login))
        .service(
            web::resource("/me")
                .wrap(auth_middleware)
                .route(web::get().to(me)),
        )
}

pub fn validate_user_create(info: &UserCreate) -> Result<(), ApiError> {
    let name = info.name.trim();
    if name.is_empty() || name.len() > 255 {
        return Err(ApiError::BadRequest(
            "Name must be between 1 and 255 characters".into(),
        ));
    }
    let email = info.email.trim();
    let valid_email = email.len() <= 255
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(ApiError::BadRequest("Invalid email address".into()));
    }
    if info.password.len() < 4 || info.password.len() > 255 {
        return Err(ApiError::BadRequest(
            "Password must be between 4 and 255 characters".into(),
        ));
    }
    Ok(())
}

fn repository_error(err: RepositoryError) -> ApiError {
    match err {
        RepositoryError::DuplicateEmail => ApiError::BadRequest(err.to_string()),
        RepositoryError::Poisoned => ApiError::Internal(err.to_string()),
    }
}

pub async fn create_user(
    info: web::Json<UserCreate>,
    users: web::Data<UserRepository>,
) -> Result<HttpResponse, ApiError> {
    let info = info.into_inner();
    validate_user_create(&info)?;

    if users
        .get_user_by_email(&info.email)
        .map_err(repository_error)?
        .is_some()
    {
        return Err(repository_error(RepositoryError::DuplicateEmail));
    }

    let password = info.password;
    let password_hash = web::block(move || hash_password(&password))
        .await?
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?;
    let user = User::new(
        info.name.trim().to_string(),
        info.email.trim().to_string(),
        password_hash,
    );
    let user = users.create_user(user).map_err(repository_error)?;
    info!(
        "Registered user {} ({} total)",
        user.email,
        users.count().map_err(repository_error)?
    );

    Ok(HttpResponse::Created().json(Message {
        message: "User created Successfully".into(),
    }))
}

pub async fn login(
    form: web::Form<LoginForm>,
    users: web::Data<UserRepository>,
    jwt_service: web::Data<JwtService>,
) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();
    let invalid = || ApiError::Unauthorized("Invalid email or password".into());

    let Some(user) = users
        .get_user_by_email(&form.username)
        .map_err(repository_error)?
    else {
        warn!("Login attempt for unknown user {}", form.username);
        return Err(invalid());
    };

    let stored = user.password_hash.clone();
    let password = form.password;
    let verified = web::block(move || verify_password(&password, &stored)).await?;
    if !verified {
        warn!("Wrong password for {}", user.email);
        return Err(invalid());
    }

    let access_token = jwt_service
        .generate_token(&user)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("Issued access token for {}", user.email);

    Ok(HttpResponse::Ok().json(Token {
        access_token,
        token_type: "bearer".into(),
    }))
}

pub async fn me(user: AuthenticatedUser) -> HttpResponse {
    let claims = user.0;
    HttpResponse::Ok().json(UserRead {
        name: claims.name,
        email: claims.email,
    })
}
