//! gnmi.gNMI 服务客户端，按 tonic 生成代码的形状手写

use crate::proto::{CapabilityRequest, CapabilityResponse, SubscribeRequest, SubscribeResponse};
use tonic::codegen::*;

/// gNMI 客户端，覆盖 Subscribe（双向流）与 Capabilities（一元）
#[derive(Debug, Clone)]
pub struct GnmiClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl GnmiClient<tonic::transport::Channel> {
    /// 直接按地址建立连接
    pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
    where
        D: TryInto<tonic::transport::Endpoint>,
        D::Error: Into<StdError>,
    {
        let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
        Ok(Self::new(conn))
    }
}

impl<T> GnmiClient<T>
where
    T: tonic::client::GrpcService<tonic::body::BoxBody>,
    T::Error: Into<StdError>,
    T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
    <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
{
    pub fn new(inner: T) -> Self {
        let inner = tonic::client::Grpc::new(inner);
        Self { inner }
    }

    pub fn with_interceptor<F>(
        inner: T,
        interceptor: F,
    ) -> GnmiClient<InterceptedService<T, F>>
    where
        F: tonic::service::Interceptor,
        T::ResponseBody: Default,
        T: tonic::codegen::Service<
            http::Request<tonic::body::BoxBody>,
            Response = http::Response<
                <T as tonic::client::GrpcService<tonic::body::BoxBody>>::ResponseBody,
            >,
        >,
        <T as tonic::codegen::Service<http::Request<tonic::body::BoxBody>>>::Error:
            Into<StdError> + std::marker::Send + std::marker::Sync,
    {
        GnmiClient::new(InterceptedService::new(inner, interceptor))
    }

    /// 双向流订阅
    pub async fn subscribe(
        &mut self,
        request: impl tonic::IntoStreamingRequest<Message = SubscribeRequest>,
    ) -> std::result::Result<
        tonic::Response<tonic::codec::Streaming<SubscribeResponse>>,
        tonic::Status,
    > {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
        })?;
        let codec = tonic::codec::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/gnmi.gNMI/Subscribe");
        let mut req = request.into_streaming_request();
        req.extensions_mut()
            .insert(GrpcMethod::new("gnmi.gNMI", "Subscribe"));
        self.inner.streaming(req, path, codec).await
    }

    /// 一元能力探测
    pub async fn capabilities(
        &mut self,
        request: impl tonic::IntoRequest<CapabilityRequest>,
    ) -> std::result::Result<tonic::Response<CapabilityResponse>, tonic::Status> {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
        })?;
        let codec = tonic::codec::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/gnmi.gNMI/Capabilities");
        let mut req = request.into_request();
        req.extensions_mut()
            .insert(GrpcMethod::new("gnmi.gNMI", "Capabilities"));
        self.inner.unary(req, path, codec).await
    }
}
