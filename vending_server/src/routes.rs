//! Request handler definitions
//!
//! Define each route and its handler here. Handlers stay thin: the work happens in the engine's [`Reconciler`] and
//! [`EventRouter`].
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here is async, and anything that touches the
//! database is awaited.
use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use log::*;
use vending_engine::{
    db_types::{PaymentMethod, ProductRef},
    traits::VendingDatabase,
    EventRouter,
    Reconciler,
};

use crate::{
    data_objects::{
        CancelSessionRequest,
        CreateSessionRequest,
        CreateSessionResponse,
        JsonResponse,
        LimitQuery,
        ProcessPaymentRequest,
        ProcessPaymentResponse,
        ProductInfo,
        ProductInfoQuery,
        SessionStatusResponse,
    },
    errors::ServerError,
};

const DEFAULT_CANCEL_REASON: &str = "cancelled by the customer";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Sessions  ----------------------------------------------------
route!(create_session => Post "/create-session" impl VendingDatabase);
/// Opens a payment session for the web payment page. The page shows the session id as a QR code, and the machine
/// quotes it back when the customer pays.
pub async fn create_session<B: VendingDatabase>(
    body: web::Json<CreateSessionRequest>,
    api: web::Data<Reconciler<B>>,
) -> Result<HttpResponse, ServerError> {
    let CreateSessionRequest { amount, machine_id } = body.into_inner();
    trace!("💻️ Received create session request for {amount} on {machine_id:?}");
    let session = api.create_session(amount, machine_id.as_deref())?;
    Ok(HttpResponse::Ok().json(CreateSessionResponse::new(&session, Utc::now())))
}

route!(process_payment => Post "/process-payment" impl VendingDatabase);
/// Records a web payment against a pending session. The product is chosen on the machine afterwards.
pub async fn process_payment<B: VendingDatabase>(
    body: web::Json<ProcessPaymentRequest>,
    api: web::Data<Reconciler<B>>,
) -> Result<HttpResponse, ServerError> {
    let ProcessPaymentRequest { session_id, payment_method } = body.into_inner();
    trace!("💻️ Received payment for session {session_id}");
    let method = payment_method
        .map(|m| m.parse::<PaymentMethod>())
        .transpose()
        .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    let session = api.pay_session(&session_id, method).await?;
    Ok(HttpResponse::Ok().json(ProcessPaymentResponse::from(session)))
}

route!(cancel_session => Post "/cancel-session" impl VendingDatabase);
pub async fn cancel_session<B: VendingDatabase>(
    body: web::Json<CancelSessionRequest>,
    api: web::Data<Reconciler<B>>,
) -> Result<HttpResponse, ServerError> {
    let CancelSessionRequest { session_id, reason } = body.into_inner();
    let reason = reason.unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());
    trace!("💻️ Received cancel request for session {session_id}. {reason}");
    let session = api.cancel_session(&session_id, &reason).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Session {} cancelled", session.session_id))))
}

route!(session_status => Get "/session-status/{session_id}" impl VendingDatabase);
pub async fn session_status<B: VendingDatabase>(
    path: web::Path<String>,
    api: web::Data<Reconciler<B>>,
) -> Result<HttpResponse, ServerError> {
    let session_id = path.into_inner();
    trace!("💻️ Received status request for session {session_id}");
    let session = api.session(&session_id)?;
    Ok(HttpResponse::Ok().json(SessionStatusResponse::from(session)))
}

//----------------------------------------------   Products  ----------------------------------------------------
route!(product_info => Get "/product-info" impl VendingDatabase);
pub async fn product_info<B: VendingDatabase>(
    query: web::Query<ProductInfoQuery>,
    api: web::Data<Reconciler<B>>,
) -> Result<HttpResponse, ServerError> {
    let product = query.into_inner().product;
    trace!("💻️ Received product info request for {product}");
    let product_ref = match product.trim().parse::<i64>() {
        Ok(id) => ProductRef::from_parts(Some(id), None),
        Err(_) => ProductRef::from_parts(None, Some(product)),
    }
    .ok_or_else(|| ServerError::InvalidRequestPath("a product id or slot is required".into()))?;
    let product = api.ledger().find_by_id_or_position(&product_ref).await?;
    Ok(HttpResponse::Ok().json(ProductInfo::from(product)))
}

route!(products => Get "/products" impl VendingDatabase);
pub async fn products<B: VendingDatabase>(api: web::Data<Reconciler<B>>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received products request");
    let products = api.ledger().list().await?;
    Ok(HttpResponse::Ok().json(products))
}

//----------------------------------------------   Journals  ----------------------------------------------------
route!(sales => Get "/sales" impl VendingDatabase);
pub async fn sales<B: VendingDatabase>(
    query: web::Query<LimitQuery>,
    api: web::Data<Reconciler<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received sales request");
    let sales = api.sales(query.limit).await?;
    Ok(HttpResponse::Ok().json(sales))
}

route!(reports => Get "/reports" impl VendingDatabase);
pub async fn reports<B: VendingDatabase>(
    query: web::Query<LimitQuery>,
    router: web::Data<EventRouter<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received reports request");
    let reports = router.report_sink().list(query.limit).await?;
    Ok(HttpResponse::Ok().json(reports))
}

//----------------------------------------------   Machine events  ----------------------------------------------------
route!(machine_event => Post "/events/{category}" impl VendingDatabase);
/// Ingests one event from a machine. The body is passed to the router untouched, so that malformed payloads are
/// answered with a confirmation rather than an HTTP error.
///
/// Dropped events and status messages have nothing to confirm and get a bare `202 Accepted`.
pub async fn machine_event<B: VendingDatabase>(
    path: web::Path<String>,
    body: web::Bytes,
    router: web::Data<EventRouter<B>>,
) -> HttpResponse {
    let category = path.into_inner();
    trace!("💻️ Received {category} event");
    let outcome = router.route(&category, &body).await;
    match outcome.confirmation {
        Some(confirmation) => HttpResponse::Ok().json(confirmation),
        None => HttpResponse::Accepted().finish(),
    }
}
