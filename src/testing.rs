//! Shared fixtures: a trimmed Kubernetes OpenAPI document for `v1/Service`
//! and a live Service written by `kubectl apply` then `kubectl edit`.

use crate::openapi::OpenAPIDocument;
use crate::schema::{GroupVersionKind, SchemaRegistry};

pub const SERVICE_TYPE: &str = "io.k8s.api.core.v1.Service";

pub const SERVICE_OPENAPI: &str = r##"{
  "swagger": "2.0",
  "info": {"title": "Kubernetes", "version": "v1.29.0"},
  "definitions": {
    "io.k8s.api.core.v1.Service": {
      "type": "object",
      "properties": {
        "apiVersion": {"type": "string"},
        "kind": {"type": "string"},
        "metadata": {"$ref": "#/definitions/io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta"},
        "spec": {"$ref": "#/definitions/io.k8s.api.core.v1.ServiceSpec"},
        "status": {"type": "object", "x-kubernetes-preserve-unknown-fields": true}
      },
      "x-kubernetes-group-version-kind": [
        {"group": "", "kind": "Service", "version": "v1"}
      ]
    },
    "io.k8s.api.core.v1.ServiceSpec": {
      "type": "object",
      "properties": {
        "clusterIP": {"type": "string"},
        "clusterIPs": {
          "type": "array",
          "items": {"type": "string"},
          "x-kubernetes-list-type": "atomic"
        },
        "externalTrafficPolicy": {"type": "string"},
        "internalTrafficPolicy": {"type": "string"},
        "ipFamilies": {
          "type": "array",
          "items": {"type": "string"},
          "x-kubernetes-list-type": "atomic"
        },
        "ipFamilyPolicy": {"type": "string"},
        "ports": {
          "type": "array",
          "items": {"$ref": "#/definitions/io.k8s.api.core.v1.ServicePort"},
          "x-kubernetes-list-map-keys": ["port", "protocol"],
          "x-kubernetes-list-type": "map",
          "x-kubernetes-patch-merge-key": "port",
          "x-kubernetes-patch-strategy": "merge"
        },
        "selector": {
          "type": "object",
          "additionalProperties": {"type": "string"},
          "x-kubernetes-map-type": "atomic"
        },
        "sessionAffinity": {"type": "string"},
        "type": {"type": "string"}
      }
    },
    "io.k8s.api.core.v1.ServicePort": {
      "type": "object",
      "required": ["port"],
      "properties": {
        "name": {"type": "string"},
        "nodePort": {"type": "integer", "format": "int32"},
        "port": {"type": "integer", "format": "int32"},
        "protocol": {"type": "string", "default": "TCP"},
        "targetPort": {"$ref": "#/definitions/io.k8s.apimachinery.pkg.util.intstr.IntOrString"}
      }
    },
    "io.k8s.apimachinery.pkg.util.intstr.IntOrString": {
      "type": "string",
      "format": "int-or-string"
    },
    "io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta": {
      "type": "object",
      "properties": {
        "annotations": {"type": "object", "additionalProperties": {"type": "string"}},
        "labels": {"type": "object", "additionalProperties": {"type": "string"}},
        "managedFields": {
          "type": "array",
          "items": {"$ref": "#/definitions/io.k8s.apimachinery.pkg.apis.meta.v1.ManagedFieldsEntry"},
          "x-kubernetes-list-type": "atomic"
        },
        "name": {"type": "string"},
        "namespace": {"type": "string"},
        "resourceVersion": {"type": "string"},
        "uid": {"type": "string"}
      }
    },
    "io.k8s.apimachinery.pkg.apis.meta.v1.ManagedFieldsEntry": {
      "type": "object",
      "properties": {
        "apiVersion": {"type": "string"},
        "fieldsType": {"type": "string"},
        "fieldsV1": {"type": "object"},
        "manager": {"type": "string"},
        "operation": {"type": "string"},
        "subresource": {"type": "string"},
        "time": {"type": "string", "format": "date-time"}
      }
    }
  }
}"##;

/// The live object after `kubectl apply` and a `kubectl edit` of the
/// node port.
pub const SERVICE_LIVE: &str = r#"{"apiVersion":"v1","kind":"Service","metadata":{"annotations":{},"managedFields":[{"apiVersion":"v1","fieldsType":"FieldsV1","fieldsV1":{"f:metadata":{"f:annotations":{".":{},"f:kubectl.kubernetes.io/last-applied-configuration":{}}},"f:spec":{"f:externalTrafficPolicy":{},"f:internalTrafficPolicy":{},"f:ports":{".":{},"k:{\"port\":80,\"protocol\":\"TCP\"}":{".":{},"f:name":{},"f:port":{},"f:protocol":{},"f:targetPort":{}}},"f:selector":{},"f:sessionAffinity":{},"f:type":{}}},"manager":"kubectl-client-side-apply","operation":"Update","time":"2023-12-21T05:29:51Z"},{"apiVersion":"v1","fieldsType":"FieldsV1","fieldsV1":{"f:spec":{"f:ports":{"k:{\"port\":80,\"protocol\":\"TCP\"}":{"f:nodePort":{}}}}},"manager":"kubectl-edit","operation":"Update","time":"2023-12-21T05:59:59Z"}],"name":"clear-nginx-service"},"spec":{"clusterIP":"172.19.41.134","clusterIPs":["172.19.41.134"],"externalTrafficPolicy":"Cluster","internalTrafficPolicy":"Cluster","ipFamilies":["IPv4"],"ipFamilyPolicy":"SingleStack","ports":[{"name":"http","nodePort":30001,"port":80,"protocol":"TCP","targetPort":80}],"selector":{"app":"clear-nginx"},"sessionAffinity":"None","type":"NodePort"}}"#;

/// The object produced by replaying the client-side-apply manager alone.
pub const SERVICE_REPLAYED: &str = r#"{"metadata":{"annotations":null},"spec":{"externalTrafficPolicy":"Cluster","internalTrafficPolicy":"Cluster","ports":[{"name":"http","port":80,"protocol":"TCP","targetPort":80}],"selector":{"app":"clear-nginx"},"sessionAffinity":"None","type":"NodePort"}}"#;

pub fn service_gvk() -> GroupVersionKind {
    GroupVersionKind::new("", "v1", "Service")
}

pub fn service_registry() -> SchemaRegistry {
    let doc = OpenAPIDocument::from_json(SERVICE_OPENAPI).unwrap();
    SchemaRegistry::from_openapi(&doc).unwrap()
}
